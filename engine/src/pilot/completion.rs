//! Task completion policies
//!
//! Evaluated by the pilot at the end of every cycle that left the task
//! non-terminal. Returning `true` marks the task done.

use super::task::TaskContext;

pub trait CompletionPolicy: Send + Sync {
    fn is_complete(&self, context: &TaskContext) -> bool;
}

/// Done as soon as any ability invocation succeeded
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyActionCompletes;

impl CompletionPolicy for AnyActionCompletes {
    fn is_complete(&self, context: &TaskContext) -> bool {
        !context.prior_actions().is_empty()
    }
}

/// Done when a predicate over the context holds
pub struct Predicate<F>(pub F);

impl<F> CompletionPolicy for Predicate<F>
where
    F: Fn(&TaskContext) -> bool + Send + Sync,
{
    fn is_complete(&self, context: &TaskContext) -> bool {
        (self.0)(context)
    }
}

/// Never done; the task runs until its cycle budget is spent
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverComplete;

impl CompletionPolicy for NeverComplete {
    fn is_complete(&self, _context: &TaskContext) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::{AbilityAction, AbilityArguments, AbilityOutput};

    #[test]
    fn test_any_action_completes() {
        let mut ctx = TaskContext::default();
        assert!(!AnyActionCompletes.is_complete(&ctx));

        ctx.record_action(AbilityAction::new(
            "noop",
            AbilityArguments::new(),
            AbilityOutput::default(),
        ));
        assert!(AnyActionCompletes.is_complete(&ctx));
        assert!(!NeverComplete.is_complete(&ctx));
    }

    #[test]
    fn test_predicate_policy() {
        let policy = Predicate(|ctx: &TaskContext| ctx.cycle_count() >= 2);
        let mut ctx = TaskContext::default();
        let action = AbilityAction::new("a", AbilityArguments::new(), AbilityOutput::default());

        ctx.record_action(action.clone());
        assert!(!policy.is_complete(&ctx));
        ctx.record_action(action);
        assert!(policy.is_complete(&ctx));
    }
}
