use crate::error::{TbError, TbResult};
use crate::sim_if::{SimIf, SIM_IF};
use crate::trigger::Trigger;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// Unsigned bit vector of the given width (1..=64).
    Vector(u32),
    Hier,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> String {
        SIM_IF
            .get_full_name(self.handle)
            .unwrap_or_else(|_| format!("<handle {}>", self.handle))
    }

    pub fn width(&self) -> Option<u32> {
        match self.kind {
            ObjectKind::Vector(width) => Some(width),
            ObjectKind::Hier => None,
        }
    }

    pub fn has_value(&self) -> bool {
        !matches!(self.kind, ObjectKind::Hier)
    }

    pub fn get_child(&self, name: &str) -> TbResult<Self> {
        let mut child_name = self.name();
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(&child_name)
    }

    /// Short for [`SimObject::get_child`].
    pub fn c(&self, name: &str) -> TbResult<Self> {
        self.get_child(name)
    }

    pub fn from_handle(handle: usize) -> TbResult<Self> {
        Ok(SimObject {
            handle,
            kind: SIM_IF.get_kind(handle)?,
        })
    }

    pub fn from_name(full_name: &str) -> TbResult<Self> {
        let handle = SIM_IF.get_handle_by_name(full_name)?;
        SimObject::from_handle(handle)
    }

    pub fn get_root() -> TbResult<Self> {
        SimObject::from_handle(SIM_IF.get_root_handle()?)
    }

    pub fn u64(&self) -> TbResult<u64> {
        SIM_IF.get_value(self.handle)
    }

    pub fn is_high(&self) -> TbResult<bool> {
        Ok(self.u64()? != 0)
    }

    /// Stage a new value; it becomes visible once the current delta cycle commits.
    pub fn set(&self, val: u64) -> TbResult<()> {
        SIM_IF.set_value(self.handle, val)
    }

    pub fn bin(&self) -> TbResult<String> {
        let width = self
            .width()
            .ok_or_else(|| TbError::NotASignal(self.name()))?;
        Ok(format!("{:0width$b}", self.u64()?, width = width as usize))
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}

impl std::fmt::Display for SimObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Simulation;

    #[test]
    fn resolves_children_by_name() {
        let sim = Simulation::new("top");
        sim.add_signal("data", 8, 0x5a).unwrap();
        let root = SimObject::get_root().unwrap();
        let data = root.c("data").unwrap();
        assert_eq!(data.name(), "top.data");
        assert_eq!(data.width(), Some(8));
        assert_eq!(data.u64().unwrap(), 0x5a);
        assert_eq!(data.bin().unwrap(), "01011010");
        assert!(matches!(root.c("nope"), Err(TbError::NoSuchObject(_))));
    }

    #[test]
    fn root_has_no_value() {
        Simulation::new("top");
        let root = SimObject::get_root().unwrap();
        assert!(!root.has_value());
        assert!(matches!(root.u64(), Err(TbError::NotASignal(_))));
    }
}
