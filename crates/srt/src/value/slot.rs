use super::Value;
use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Holds at most one [`Value`]; starts empty and is rewritten across runs.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    value: Option<Value>,
}

impl Slot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Borrows the held value; reading an empty slot is a contract violation.
    pub fn read(&self) -> Result<&Value> {
        self.value.as_ref().ok_or(Error::TypeProjection {
            expected: "a value",
            found: "empty slot",
        })
    }

    pub fn write(&mut self, value: Value) {
        self.value = Some(value);
    }

    pub fn take(&mut self) -> Option<Value> {
        self.value.take()
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn get_mut(&mut self) -> Option<&mut Value> {
        self.value.as_mut()
    }

    /// Mutable access to a held tensor, `None` when empty or holding another type.
    pub fn tensor_mut(&mut self) -> Option<&mut Tensor> {
        match self.value.as_mut() {
            Some(Value::Tensor(tensor)) => Some(tensor),
            _ => None,
        }
    }
}
