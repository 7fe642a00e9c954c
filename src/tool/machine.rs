use std::fmt;

use crate::{
    foundation::error::{AnnotrackError, AnnotrackResult},
    tool::bus::{EventBus, SessionEvent},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// What a pointer commit does.
pub enum Tool {
    #[default]
    Inactive,
    Add,
    Delete,
    Retype,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Inactive, Tool::Add, Tool::Delete, Tool::Retype];

    /// Position in the tool bar, as carried by [`SessionEvent::ToolSelected`].
    pub fn index(self) -> usize {
        match self {
            Tool::Inactive => 0,
            Tool::Add => 1,
            Tool::Delete => 2,
            Tool::Retype => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn is_active(self) -> bool {
        self != Tool::Inactive
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
/// Identity of a module owning a tool bar.
pub struct ModuleId(pub u32);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Tool state of one module.
///
/// `clicked` remembers the last explicit choice. A temporary override (a held modifier) only
/// changes `active`, and releasing it goes back to `clicked`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolMachine {
    module: ModuleId,
    active: Tool,
    clicked: Tool,
    temporary: Option<Tool>,
}

impl ToolMachine {
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            active: Tool::Inactive,
            clicked: Tool::Inactive,
            temporary: None,
        }
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn active(&self) -> Tool {
        self.active
    }

    pub fn clicked(&self) -> Tool {
        self.clicked
    }

    pub fn temporary(&self) -> Option<Tool> {
        self.temporary
    }

    /// Explicit selection. Clears any temporary override.
    pub fn select(&mut self, tool: Tool) {
        self.active = tool;
        self.clicked = tool;
        self.temporary = None;
    }

    /// Force `tool` while a modifier is held. A second press replaces the override.
    pub fn press_temporary(&mut self, tool: Tool) {
        self.temporary = Some(tool);
        self.active = tool;
    }

    pub fn release_temporary(&mut self) {
        if self.temporary.take().is_some() {
            self.active = self.clicked;
        }
    }

    /// Go to [`Tool::Inactive`]. Returns true if a tool was active.
    pub fn deactivate(&mut self) -> bool {
        let was_active = self.active.is_active();
        self.select(Tool::Inactive);
        was_active
    }

    /// React to a broadcast. A selection made by another module deactivates this one.
    pub fn observe(&mut self, event: &SessionEvent) -> bool {
        match event {
            SessionEvent::ToolSelected { module, .. } if *module != self.module => {
                self.deactivate()
            }
            _ => false,
        }
    }
}

/// Sibling tool machines kept mutually exclusive.
#[derive(Clone, Debug, Default)]
pub struct ToolBox {
    machines: Vec<ToolMachine>,
}

impl ToolBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a machine for `module`. Registering twice is a no-op.
    pub fn register(&mut self, module: ModuleId) {
        if self.machine(module).is_none() {
            self.machines.push(ToolMachine::new(module));
        }
    }

    pub fn machine(&self, module: ModuleId) -> Option<&ToolMachine> {
        self.machines.iter().find(|m| m.module == module)
    }

    pub fn machine_mut(&mut self, module: ModuleId) -> Option<&mut ToolMachine> {
        self.machines.iter_mut().find(|m| m.module == module)
    }

    pub fn machines(&self) -> &[ToolMachine] {
        &self.machines
    }

    /// The first module with an active tool.
    pub fn active(&self) -> Option<(ModuleId, Tool)> {
        self.machines
            .iter()
            .find(|m| m.active.is_active())
            .map(|m| (m.module, m.active))
    }

    /// Select `tool` on `module` and broadcast it.
    ///
    /// Every other machine observes the broadcast and deactivates. Returns the modules that
    /// were deactivated.
    pub fn select(
        &mut self,
        module: ModuleId,
        tool: Tool,
        bus: &mut EventBus,
    ) -> AnnotrackResult<Vec<ModuleId>> {
        self.machine_mut(module)
            .ok_or_else(|| AnnotrackError::not_found(format!("tool module {module}")))?
            .select(tool);

        let event = SessionEvent::ToolSelected {
            module,
            tool_index: tool.index(),
        };
        bus.emit(&event);

        let mut deactivated = Vec::new();
        for m in &mut self.machines {
            if m.observe(&event) {
                deactivated.push(m.module);
            }
        }
        tracing::debug!(%module, ?tool, ?deactivated, "tool selected");
        Ok(deactivated)
    }

    /// Deactivate every machine. Returns the modules that had an active tool.
    pub fn deactivate_all(&mut self) -> Vec<ModuleId> {
        self.machines
            .iter_mut()
            .filter_map(|m| m.deactivate().then_some(m.module))
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/tool/machine.rs"]
mod tests;
