//! Condition strategies: pluggable predicates resolved at load time
//!
//! Two independent families:
//! - [`FlowCondition`] decides whether a gateway's outgoing flow may be taken
//! - [`CompletionCondition`] decides whether a task may progress given the
//!   state of its participant rosters
//!
//! Strategies are written as `Name(arg1,arg2)` and resolved through a
//! [`ConditionRegistry`]. Every argument is a string; each strategy parses
//! its own argument types. Resolution happens once, when a definition is
//! compiled, so an unknown name or a bad argument is a load-time error.

use crate::{Parameters, WorkflowError, WorkflowResult};
use std::collections::HashMap;
use std::sync::Arc;

// ── Predicate traits ─────────────────────────────────────────────────

/// Decides whether a sequence flow leaving a gateway may be taken
pub trait FlowCondition: std::fmt::Debug + Send + Sync {
    fn accepts(&self, params: &Parameters) -> bool;
}

/// Participant state of a task right after one participant acted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompletionState {
    /// Entries in the assigned roster
    pub assigned: usize,
    /// Entries still in the active roster
    pub active_remaining: usize,
    /// Participants that have completed the task so far
    pub completed: usize,
}

/// Decides whether a task has finished
pub trait CompletionCondition: std::fmt::Debug + Send + Sync {
    fn is_complete(&self, state: &CompletionState) -> bool;
}

// ── Flow conditions ──────────────────────────────────────────────────

/// `Always`: every flow passes
#[derive(Clone, Debug, Default)]
pub struct AlwaysCondition;

impl FlowCondition for AlwaysCondition {
    fn accepts(&self, _params: &Parameters) -> bool {
        true
    }
}

/// `Never`: no flow passes
#[derive(Clone, Debug, Default)]
pub struct NeverCondition;

impl FlowCondition for NeverCondition {
    fn accepts(&self, _params: &Parameters) -> bool {
        false
    }
}

/// `ParamEquals(key,value)`
#[derive(Clone, Debug)]
pub struct ParamEquals {
    key: String,
    value: String,
}

impl ParamEquals {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl FlowCondition for ParamEquals {
    fn accepts(&self, params: &Parameters) -> bool {
        params.get(&self.key).is_some_and(|v| v == &self.value)
    }
}

/// `ParamNotEquals(key,value)`: an absent parameter counts as different
#[derive(Clone, Debug)]
pub struct ParamNotEquals {
    key: String,
    value: String,
}

impl ParamNotEquals {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl FlowCondition for ParamNotEquals {
    fn accepts(&self, params: &Parameters) -> bool {
        params.get(&self.key).map_or(true, |v| v != &self.value)
    }
}

/// `ParamIn(key,v1,v2,...)`
#[derive(Clone, Debug)]
pub struct ParamIn {
    key: String,
    values: Vec<String>,
}

impl ParamIn {
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }
}

impl FlowCondition for ParamIn {
    fn accepts(&self, params: &Parameters) -> bool {
        params
            .get(&self.key)
            .is_some_and(|v| self.values.iter().any(|allowed| allowed == v))
    }
}

/// `ParamExists(key)`
#[derive(Clone, Debug)]
pub struct ParamExists {
    key: String,
}

impl ParamExists {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl FlowCondition for ParamExists {
    fn accepts(&self, params: &Parameters) -> bool {
        params.contains_key(&self.key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Comparison {
    Greater,
    Less,
}

/// `ParamGreaterThan(key,n)` / `ParamLessThan(key,n)`.
///
/// A missing or non-numeric parameter never passes.
#[derive(Clone, Debug)]
pub struct ParamCompare {
    key: String,
    threshold: f64,
    comparison: Comparison,
}

impl ParamCompare {
    pub fn greater_than(key: impl Into<String>, threshold: f64) -> Self {
        Self {
            key: key.into(),
            threshold,
            comparison: Comparison::Greater,
        }
    }

    pub fn less_than(key: impl Into<String>, threshold: f64) -> Self {
        Self {
            key: key.into(),
            threshold,
            comparison: Comparison::Less,
        }
    }
}

impl FlowCondition for ParamCompare {
    fn accepts(&self, params: &Parameters) -> bool {
        let Some(actual) = params
            .get(&self.key)
            .and_then(|v| v.trim().parse::<f64>().ok())
        else {
            return false;
        };
        match self.comparison {
            Comparison::Greater => actual > self.threshold,
            Comparison::Less => actual < self.threshold,
        }
    }
}

// ── Completion conditions ────────────────────────────────────────────

/// Fixed predicate of non-multi-instance tasks: done once the participant acts
#[derive(Clone, Debug, Default)]
pub struct SingleCompletionCondition;

impl CompletionCondition for SingleCompletionCondition {
    fn is_complete(&self, _state: &CompletionState) -> bool {
        true
    }
}

/// `AllCompletionCondition`: every assigned participant has acted
#[derive(Clone, Debug, Default)]
pub struct AllCompletionCondition;

impl CompletionCondition for AllCompletionCondition {
    fn is_complete(&self, state: &CompletionState) -> bool {
        state.active_remaining == 0
    }
}

/// `OrCompletionCondition(n)`: at least `n` participants have acted,
/// however many remain outstanding
#[derive(Clone, Debug)]
pub struct OrCompletionCondition {
    threshold: usize,
}

impl OrCompletionCondition {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl CompletionCondition for OrCompletionCondition {
    fn is_complete(&self, state: &CompletionState) -> bool {
        state.completed >= self.threshold
    }
}

// ── Strategy specs ───────────────────────────────────────────────────

/// A strategy reference: a name plus ordered string arguments
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionSpec {
    pub name: String,
    pub args: Vec<String>,
}

impl ConditionSpec {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Parse `Name`, `Name()` or `Name(a, b, c)`
    pub fn parse(raw: &str) -> WorkflowResult<Self> {
        let malformed = || WorkflowError::InvalidConditionSpec(raw.to_string());
        let text = raw.trim();

        let (name, args) = match text.find('(') {
            None => (text, Vec::new()),
            Some(open) => {
                let inner = text[open + 1..].strip_suffix(')').ok_or_else(malformed)?;
                if inner.contains('(') || inner.contains(')') {
                    return Err(malformed());
                }
                let args = if inner.trim().is_empty() {
                    Vec::new()
                } else {
                    inner.split(',').map(|a| a.trim().to_string()).collect()
                };
                (text[..open].trim(), args)
            }
        };

        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '$'));
        if !valid_name {
            return Err(malformed());
        }

        Ok(Self::new(name, args))
    }

    /// The name without any package or module qualifier
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit(|c: char| c == '.' || c == ':')
            .next()
            .unwrap_or(&self.name)
    }
}

impl std::fmt::Display for ConditionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(","))
    }
}

// ── Registry ─────────────────────────────────────────────────────────

/// Builds a flow condition from its string arguments
pub type FlowConditionFactory =
    Arc<dyn Fn(&[String]) -> WorkflowResult<Arc<dyn FlowCondition>> + Send + Sync>;

/// Builds a completion condition from its string arguments
pub type CompletionConditionFactory =
    Arc<dyn Fn(&[String]) -> WorkflowResult<Arc<dyn CompletionCondition>> + Send + Sync>;

/// Maps strategy names to factories.
///
/// The registry is code, not data: it holds closures and is built the same
/// way wherever definitions are compiled.
#[derive(Clone)]
pub struct ConditionRegistry {
    flow: HashMap<String, FlowConditionFactory>,
    completion: HashMap<String, CompletionConditionFactory>,
}

impl ConditionRegistry {
    /// An empty registry without builtins
    pub fn empty() -> Self {
        Self {
            flow: HashMap::new(),
            completion: HashMap::new(),
        }
    }

    /// A registry holding every builtin strategy
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register_flow("Always", |args| {
            expect_args("Always", args, 0, Some(0))?;
            Ok(Arc::new(AlwaysCondition))
        });
        registry.register_flow("Never", |args| {
            expect_args("Never", args, 0, Some(0))?;
            Ok(Arc::new(NeverCondition))
        });
        registry.register_flow("ParamEquals", |args| {
            expect_args("ParamEquals", args, 2, Some(2))?;
            Ok(Arc::new(ParamEquals::new(&args[0], &args[1])))
        });
        registry.register_flow("ParamNotEquals", |args| {
            expect_args("ParamNotEquals", args, 2, Some(2))?;
            Ok(Arc::new(ParamNotEquals::new(&args[0], &args[1])))
        });
        registry.register_flow("ParamIn", |args| {
            expect_args("ParamIn", args, 2, None)?;
            Ok(Arc::new(ParamIn::new(&args[0], args[1..].to_vec())))
        });
        registry.register_flow("ParamExists", |args| {
            expect_args("ParamExists", args, 1, Some(1))?;
            Ok(Arc::new(ParamExists::new(&args[0])))
        });
        registry.register_flow("ParamGreaterThan", |args| {
            expect_args("ParamGreaterThan", args, 2, Some(2))?;
            let threshold = parse_number("ParamGreaterThan", &args[1])?;
            Ok(Arc::new(ParamCompare::greater_than(&args[0], threshold)))
        });
        registry.register_flow("ParamLessThan", |args| {
            expect_args("ParamLessThan", args, 2, Some(2))?;
            let threshold = parse_number("ParamLessThan", &args[1])?;
            Ok(Arc::new(ParamCompare::less_than(&args[0], threshold)))
        });

        registry.register_completion("AllCompletionCondition", |args| {
            expect_args("AllCompletionCondition", args, 0, Some(0))?;
            Ok(Arc::new(AllCompletionCondition))
        });
        registry.register_completion("OrCompletionCondition", |args| {
            expect_args("OrCompletionCondition", args, 1, Some(1))?;
            let threshold = args[0].parse::<usize>().map_err(|_| {
                WorkflowError::InvalidConditionArgs {
                    name: "OrCompletionCondition".into(),
                    reason: format!("'{}' is not a participant count", args[0]),
                }
            })?;
            if threshold == 0 {
                return Err(WorkflowError::InvalidConditionArgs {
                    name: "OrCompletionCondition".into(),
                    reason: "threshold must be at least 1".into(),
                });
            }
            Ok(Arc::new(OrCompletionCondition::new(threshold)))
        });

        registry
    }

    pub fn register_flow<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&[String]) -> WorkflowResult<Arc<dyn FlowCondition>> + Send + Sync + 'static,
    {
        self.flow.insert(name.to_string(), Arc::new(factory));
    }

    pub fn register_completion<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&[String]) -> WorkflowResult<Arc<dyn CompletionCondition>> + Send + Sync + 'static,
    {
        self.completion.insert(name.to_string(), Arc::new(factory));
    }

    pub fn contains_flow(&self, name: &str) -> bool {
        self.flow.contains_key(name)
    }

    pub fn contains_completion(&self, name: &str) -> bool {
        self.completion.contains_key(name)
    }

    /// Resolve a flow condition; qualified names fall back to their last segment
    pub fn resolve_flow(&self, spec: &ConditionSpec) -> WorkflowResult<Arc<dyn FlowCondition>> {
        let factory = self
            .flow
            .get(&spec.name)
            .or_else(|| self.flow.get(spec.simple_name()))
            .ok_or_else(|| WorkflowError::UnknownCondition(spec.name.clone()))?;
        factory(spec.args.as_slice())
    }

    /// Resolve a completion condition; qualified names fall back to their last segment
    pub fn resolve_completion(
        &self,
        spec: &ConditionSpec,
    ) -> WorkflowResult<Arc<dyn CompletionCondition>> {
        let factory = self
            .completion
            .get(&spec.name)
            .or_else(|| self.completion.get(spec.simple_name()))
            .ok_or_else(|| WorkflowError::UnknownCondition(spec.name.clone()))?;
        factory(spec.args.as_slice())
    }

    pub fn parse_flow(&self, raw: &str) -> WorkflowResult<Arc<dyn FlowCondition>> {
        self.resolve_flow(&ConditionSpec::parse(raw)?)
    }

    pub fn parse_completion(&self, raw: &str) -> WorkflowResult<Arc<dyn CompletionCondition>> {
        self.resolve_completion(&ConditionSpec::parse(raw)?)
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut flow: Vec<_> = self.flow.keys().collect();
        flow.sort();
        let mut completion: Vec<_> = self.completion.keys().collect();
        completion.sort();
        f.debug_struct("ConditionRegistry")
            .field("flow", &flow)
            .field("completion", &completion)
            .finish()
    }
}

fn expect_args(name: &str, args: &[String], min: usize, max: Option<usize>) -> WorkflowResult<()> {
    let too_few = args.len() < min;
    let too_many = max.is_some_and(|max| args.len() > max);
    if too_few || too_many {
        let expected = match max {
            Some(max) if max == min => format!("{min}"),
            Some(max) => format!("{min}..={max}"),
            None => format!("at least {min}"),
        };
        return Err(WorkflowError::InvalidConditionArgs {
            name: name.to_string(),
            reason: format!("expected {} argument(s), got {}", expected, args.len()),
        });
    }
    Ok(())
}

fn parse_number(name: &str, raw: &str) -> WorkflowResult<f64> {
    raw.parse::<f64>()
        .map_err(|_| WorkflowError::InvalidConditionArgs {
            name: name.to_string(),
            reason: format!("'{}' is not a number", raw),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_spec_forms() {
        assert_eq!(
            ConditionSpec::parse("AllCompletionCondition").unwrap(),
            ConditionSpec::new("AllCompletionCondition", vec![])
        );
        assert_eq!(
            ConditionSpec::parse("AllCompletionCondition()").unwrap().args,
            Vec::<String>::new()
        );
        let spec = ConditionSpec::parse(" ParamIn( status , open, closed ) ").unwrap();
        assert_eq!(spec.name, "ParamIn");
        assert_eq!(spec.args, vec!["status", "open", "closed"]);
        assert_eq!(spec.to_string(), "ParamIn(status,open,closed)");
    }

    #[test]
    fn test_parse_spec_rejects_malformed() {
        for raw in ["", "(a)", "Name(a", "Name(a(b))", "Bad Name(a)"] {
            assert!(
                matches!(
                    ConditionSpec::parse(raw),
                    Err(WorkflowError::InvalidConditionSpec(_))
                ),
                "expected '{raw}' to be rejected"
            );
        }
    }

    #[test]
    fn test_qualified_names_resolve() {
        let registry = ConditionRegistry::with_builtins();
        let spec = ConditionSpec::parse("org.example.flow.OrCompletionCondition(2)").unwrap();
        assert_eq!(spec.simple_name(), "OrCompletionCondition");
        let condition = registry.resolve_completion(&spec).unwrap();
        let state = CompletionState {
            assigned: 3,
            active_remaining: 1,
            completed: 2,
        };
        assert!(condition.is_complete(&state));
    }

    #[test]
    fn test_unknown_strategy_fails() {
        let registry = ConditionRegistry::with_builtins();
        assert!(matches!(
            registry.parse_flow("Coinflip(0.5)"),
            Err(WorkflowError::UnknownCondition(name)) if name == "Coinflip"
        ));
        // families are independent
        assert!(matches!(
            registry.parse_completion("ParamEquals(a,b)"),
            Err(WorkflowError::UnknownCondition(_))
        ));
    }

    #[test]
    fn test_bad_arguments_fail_at_resolution() {
        let registry = ConditionRegistry::with_builtins();
        assert!(matches!(
            registry.parse_completion("OrCompletionCondition(many)"),
            Err(WorkflowError::InvalidConditionArgs { .. })
        ));
        assert!(matches!(
            registry.parse_completion("OrCompletionCondition(0)"),
            Err(WorkflowError::InvalidConditionArgs { .. })
        ));
        assert!(matches!(
            registry.parse_flow("ParamEquals(p)"),
            Err(WorkflowError::InvalidConditionArgs { .. })
        ));
        assert!(matches!(
            registry.parse_flow("ParamGreaterThan(p,ten)"),
            Err(WorkflowError::InvalidConditionArgs { .. })
        ));
    }

    #[test]
    fn test_builtin_flow_conditions() {
        let registry = ConditionRegistry::with_builtins();
        let p = params(&[("p", "1"), ("amount", "250.5"), ("status", "open")]);

        assert!(registry.parse_flow("Always").unwrap().accepts(&p));
        assert!(!registry.parse_flow("Never()").unwrap().accepts(&p));
        assert!(registry.parse_flow("ParamEquals(p,1)").unwrap().accepts(&p));
        assert!(!registry.parse_flow("ParamEquals(p,2)").unwrap().accepts(&p));
        assert!(registry.parse_flow("ParamNotEquals(p,2)").unwrap().accepts(&p));
        assert!(registry
            .parse_flow("ParamNotEquals(missing,2)")
            .unwrap()
            .accepts(&p));
        assert!(registry
            .parse_flow("ParamIn(status,open,pending)")
            .unwrap()
            .accepts(&p));
        assert!(registry.parse_flow("ParamExists(amount)").unwrap().accepts(&p));
        assert!(!registry.parse_flow("ParamExists(nope)").unwrap().accepts(&p));
        assert!(registry
            .parse_flow("ParamGreaterThan(amount,100)")
            .unwrap()
            .accepts(&p));
        assert!(!registry
            .parse_flow("ParamLessThan(amount,100)")
            .unwrap()
            .accepts(&p));
        assert!(!registry
            .parse_flow("ParamLessThan(status,100)")
            .unwrap()
            .accepts(&p));
    }

    #[test]
    fn test_completion_conditions() {
        let all = AllCompletionCondition;
        let or_one = OrCompletionCondition::new(1);

        let first_done = CompletionState {
            assigned: 3,
            active_remaining: 2,
            completed: 1,
        };
        assert!(!all.is_complete(&first_done));
        assert!(or_one.is_complete(&first_done));

        let all_done = CompletionState {
            assigned: 3,
            active_remaining: 0,
            completed: 3,
        };
        assert!(all.is_complete(&all_done));
        assert!(SingleCompletionCondition.is_complete(&CompletionState::default()));
    }

    #[test]
    fn test_register_custom_strategy() {
        #[derive(Debug)]
        struct Quorum(usize);
        impl CompletionCondition for Quorum {
            fn is_complete(&self, state: &CompletionState) -> bool {
                state.completed * 100 >= state.assigned * self.0
            }
        }

        let mut registry = ConditionRegistry::empty();
        assert!(!registry.contains_completion("Quorum"));
        registry.register_completion("Quorum", |args| {
            let pct = args
                .first()
                .and_then(|a| a.parse().ok())
                .ok_or_else(|| WorkflowError::InvalidConditionArgs {
                    name: "Quorum".into(),
                    reason: "expected a percentage".into(),
                })?;
            Ok(Arc::new(Quorum(pct)))
        });

        let quorum = registry.parse_completion("Quorum(50)").unwrap();
        let state = CompletionState {
            assigned: 4,
            active_remaining: 2,
            completed: 2,
        };
        assert!(quorum.is_complete(&state));
        assert!(format!("{:?}", registry).contains("Quorum"));
    }
}
