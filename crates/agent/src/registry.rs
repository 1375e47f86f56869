use std::collections::HashMap;
use std::sync::Arc;

use merryway_core::domain::memory::AgentTarget;

use crate::agents::Agent;

/// Dispatch table from classification decision to the agent that handles it.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentTarget, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn register(&mut self, target: AgentTarget, agent: Arc<dyn Agent>) {
        self.agents.insert(target, agent);
    }

    pub fn with(mut self, target: AgentTarget, agent: Arc<dyn Agent>) -> Self {
        self.register(target, agent);
        self
    }

    pub fn get(&self, target: AgentTarget) -> Option<Arc<dyn Agent>> {
        self.agents.get(&target).cloned()
    }

    /// Targets without a registered agent, in declaration order.
    pub fn missing(&self) -> Vec<AgentTarget> {
        AgentTarget::ALL.into_iter().filter(|target| !self.agents.contains_key(target)).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
