use smallvec::SmallVec;

use crate::value::{StackValue, Value};
use crate::Trap;

/// The operand stack of one invocation.
#[derive(Debug, Default)]
pub(crate) struct Stack {
    values: Vec<Value>,
}

impl Stack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub(crate) fn push<T: StackValue>(&mut self, val: T) {
        self.values.push(val.into_value())
    }

    #[inline]
    pub(crate) fn push_value(&mut self, val: Value) {
        self.values.push(val)
    }

    #[inline]
    pub(crate) fn pop<T: StackValue>(&mut self) -> Result<T, Trap> {
        let value = self.pop_value()?;
        T::from_value(value).ok_or(Trap::ValueTypeMismatch {
            expected: T::TYPE,
            received: value.ty(),
        })
    }

    #[inline]
    pub(crate) fn pop_value(&mut self) -> Result<Value, Trap> {
        self.values.pop().ok_or(Trap::StackUnderflow)
    }

    /// Pop the top `count` values, preserving their order.
    pub(crate) fn pop_n(&mut self, count: usize) -> Result<SmallVec<[Value; 4]>, Trap> {
        let Some(at) = self.values.len().checked_sub(count) else {
            return Err(Trap::StackUnderflow);
        };
        Ok(self.values.drain(at..).collect())
    }

    /// Keep the top `arity` values and discard everything between them and `height`.
    pub(crate) fn unwind(&mut self, height: usize, arity: usize) -> Result<(), Trap> {
        let len = self.values.len();
        if len < height + arity {
            return Err(Trap::StackUnderflow);
        }
        self.values.drain(height..len - arity);
        Ok(())
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.values
    }
}
