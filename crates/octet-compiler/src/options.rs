//! Compilation settings.

/// Settings for one [`Compiler::compile`](crate::Compiler::compile) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Names that always count as used: the program's entry point and its
    /// enclosing scopes.
    pub entry_point: Vec<String>,
    /// Optimizer iterations allowed before giving up on a fixed point.
    pub max_optimizer_passes: usize,
    /// Run the expression simplifier and the statement optimizer.
    /// Constant folding runs either way.
    pub optimize: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            entry_point: vec!["main".to_string(), "main.start".to_string()],
            max_optimizer_passes: 100,
            optimize: true,
        }
    }
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `name` (dotted) as the entry point. Its prefixes are marked used
    /// as well.
    pub fn with_entry_point(mut self, name: &str) -> Self {
        let segments: Vec<&str> = name.split('.').collect();
        self.entry_point = (1..=segments.len())
            .map(|n| segments[..n].join("."))
            .collect();
        self
    }

    pub fn with_max_optimizer_passes(mut self, passes: usize) -> Self {
        self.max_optimizer_passes = passes;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.entry_point, vec!["main", "main.start"]);
        assert_eq!(options.max_optimizer_passes, 100);
        assert!(options.optimize);
    }

    #[test]
    fn entry_point_includes_prefixes() {
        let options = CompilerOptions::new()
            .with_entry_point("game.loop.run")
            .with_optimize(false);
        assert_eq!(
            options.entry_point,
            vec!["game", "game.loop", "game.loop.run"]
        );
        assert!(!options.optimize);
    }
}
