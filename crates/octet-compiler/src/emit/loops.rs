//! Loop label tracking for `break` and `continue`.

/// Stack of the enclosing loops' exit and continuation labels.
#[derive(Debug, Default)]
pub struct LoopLabels {
    /// Innermost loop last.
    loops: Vec<LoopContext>,
}

#[derive(Debug)]
struct LoopContext {
    break_label: String,
    continue_label: String,
}

impl LoopLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_loop(
        &mut self,
        break_label: impl Into<String>,
        continue_label: impl Into<String>,
    ) {
        self.loops.push(LoopContext {
            break_label: break_label.into(),
            continue_label: continue_label.into(),
        });
    }

    pub fn exit_loop(&mut self) {
        self.loops.pop();
    }

    pub fn in_loop(&self) -> bool {
        !self.loops.is_empty()
    }

    /// Where `break` jumps in the innermost loop.
    pub fn break_label(&self) -> Option<&str> {
        self.loops.last().map(|ctx| ctx.break_label.as_str())
    }

    /// Where `continue` jumps in the innermost loop.
    pub fn continue_label(&self) -> Option<&str> {
        self.loops.last().map(|ctx| ctx.continue_label.as_str())
    }

    pub fn loop_depth(&self) -> usize {
        self.loops.len()
    }
}
