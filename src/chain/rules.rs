use crate::chain::block::StoredBlock;
use crate::chain::store::BlockStore;
use crate::Result;

/// Checks the context-dependent rules for a candidate block against its parent, e.g.
/// that the declared difficulty matches the network's retarget schedule.
///
/// Failures are reported as [Error::RulesViolated](crate::Error::RulesViolated).
pub trait RuleChecker: Send + Sync {
    fn check_rules(
        &self,
        prev: &StoredBlock,
        candidate: &StoredBlock,
        store: &dyn BlockStore,
    ) -> Result<()>;
}

/// Produces the [RuleChecker] appropriate for a particular parent/candidate pair.
///
/// Networks with scheduled rule changes return different checkers for different chain
/// segments; the engine asks for a fresh checker on every connect.
pub trait RuleCheckerFactory: Send + Sync {
    fn rule_checker(&self, prev: &StoredBlock, candidate: &StoredBlock) -> Box<dyn RuleChecker>;
}

/// A rule checker that accepts every block. Useful for tests and for applications that
/// track headers whose difficulty schedule is validated elsewhere.
pub struct AlwaysValidRules;

impl RuleChecker for AlwaysValidRules {
    fn check_rules(
        &self,
        _prev: &StoredBlock,
        _candidate: &StoredBlock,
        _store: &dyn BlockStore,
    ) -> Result<()> {
        Ok(())
    }
}

impl RuleCheckerFactory for AlwaysValidRules {
    fn rule_checker(&self, _prev: &StoredBlock, _candidate: &StoredBlock) -> Box<dyn RuleChecker> {
        Box::new(AlwaysValidRules)
    }
}
