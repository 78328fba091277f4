use std::fmt;

/// A parsed compilation unit: a flat sequence of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, value: Expr },
    Return { value: Expr },
    Expression(Expr),
    Block(Vec<Stmt>),
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Let { name, value } => write!(f, "let {name} = {value};"),
            Stmt::Return { value } => write!(f, "return {value};"),
            Stmt::Expression(expr) => write!(f, "{expr}"),
            Stmt::Block(stmts) => {
                for s in stmts {
                    write!(f, "{s}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntegerLiteral(i64),
    StringLiteral(String),
    Boolean(bool),
    Identifier(String),
    Prefix {
        operator: String,
        right: Box<Expr>,
    },
    Infix {
        left: Box<Expr>,
        operator: String,
        right: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        consequence: Vec<Stmt>,
        alternative: Option<Vec<Stmt>>,
    },
    ArrayLiteral(Vec<Expr>),
    HashLiteral(Vec<(Expr, Expr)>),
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
    },
    FunctionLiteral {
        name: Option<String>,
        parameters: Vec<String>,
        body: Vec<Stmt>,
    },
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntegerLiteral(v) => write!(f, "{v}"),
            Expr::StringLiteral(s) => write!(f, "{s}"),
            Expr::Boolean(b) => write!(f, "{b}"),
            Expr::Identifier(name) => write!(f, "{name}"),
            Expr::Prefix { operator, right } => write!(f, "({operator}{right})"),
            Expr::Infix {
                left,
                operator,
                right,
            } => write!(f, "({left} {operator} {right})"),
            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if{condition} {{")?;
                for s in consequence {
                    write!(f, "{s}")?;
                }
                write!(f, "}}")?;
                if let Some(alt) = alternative {
                    write!(f, "else {{")?;
                    for s in alt {
                        write!(f, "{s}")?;
                    }
                    write!(f, "}}")?;
                }
                Ok(())
            }
            Expr::ArrayLiteral(elements) => {
                let items: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Expr::HashLiteral(pairs) => {
                let items: Vec<String> =
                    pairs.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            Expr::Index { left, index } => write!(f, "({left}[{index}])"),
            Expr::FunctionLiteral {
                name, parameters, ..
            } => {
                let label = name.as_deref().unwrap_or("");
                write!(f, "fn{label}({})", parameters.join(", "))
            }
            Expr::Call {
                function,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{function}({})", args.join(", "))
            }
        }
    }
}
