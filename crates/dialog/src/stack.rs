//! Per-conversation dialog stack
//!
//! The stack is never empty: the root dialog instance always sits at
//! index 0 and cannot be popped. The last instance is the active one.

use serde::{Deserialize, Serialize};

use supportbot_core::StateBag;

/// One running dialog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogInstance {
    pub dialog: String,
    /// Step that receives the next input
    pub step_index: usize,
    #[serde(default)]
    pub dialog_data: StateBag,
    /// A prompt issued by this instance is outstanding
    #[serde(default)]
    pub awaiting_prompt: bool,
}

impl DialogInstance {
    pub fn new(dialog: impl Into<String>) -> Self {
        Self {
            dialog: dialog.into(),
            step_index: 0,
            dialog_data: StateBag::new(),
            awaiting_prompt: false,
        }
    }
}

/// Ordered dialog instances, root first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogStack {
    instances: Vec<DialogInstance>,
}

impl DialogStack {
    /// Stack holding only the root instance
    pub fn new(root: &str) -> Self {
        Self {
            instances: vec![DialogInstance::new(root)],
        }
    }

    pub fn depth(&self) -> usize {
        self.instances.len()
    }

    pub fn is_root_only(&self) -> bool {
        self.instances.len() <= 1
    }

    pub fn root(&self) -> &DialogInstance {
        &self.instances[0]
    }

    /// Active instance
    pub fn top(&self) -> &DialogInstance {
        &self.instances[self.instances.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut DialogInstance {
        let last = self.instances.len() - 1;
        &mut self.instances[last]
    }

    pub fn instances(&self) -> &[DialogInstance] {
        &self.instances
    }

    /// Dialog names, root first
    pub fn names(&self) -> Vec<&str> {
        self.instances.iter().map(|i| i.dialog.as_str()).collect()
    }

    pub fn contains(&self, dialog: &str) -> bool {
        self.instances.iter().any(|i| i.dialog == dialog)
    }

    pub fn push(&mut self, instance: DialogInstance) {
        self.instances.push(instance);
    }

    /// Pop the active instance; the root is never popped
    pub fn pop(&mut self) -> Option<DialogInstance> {
        if self.is_root_only() {
            None
        } else {
            self.instances.pop()
        }
    }

    /// Drop everything above the root and return the root to step 0
    pub fn clear_to_root(&mut self) {
        self.instances.truncate(1);
        let root = &mut self.instances[0];
        root.step_index = 0;
        root.awaiting_prompt = false;
        root.dialog_data.clear();
    }

    /// Repair a stack loaded from storage so it starts with `root`
    ///
    /// Returns `true` when the stack had to be reset.
    pub fn ensure_root(&mut self, root: &str) -> bool {
        match self.instances.first() {
            Some(first) if first.dialog == root => false,
            _ => {
                self.instances = vec![DialogInstance::new(root)];
                true
            }
        }
    }
}
