use std::rc::Rc;

use monkey_object::Closure;

/// One call's activation record: the closure it's executing, its own
/// instruction pointer, and the base stack slot its locals start at. `ip`
/// starts at the notional "before the first byte" position (`-1` in the
/// original, represented here as `usize::MAX` would be awkward, so we start
/// at 0 and treat `ip` as "next instruction to fetch" rather than "last
/// instruction fetched" — the VM's main loop reads-then-advances).
pub struct Frame {
    pub closure: Rc<Closure>,
    pub ip: usize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Frame {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &[u8] {
        &self.closure.func.instructions
    }
}
