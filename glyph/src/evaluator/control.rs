use crate::value::Value;

/// Outcome of executing a statement.
///
/// Statements hand this back up through every enclosing block; loops consume
/// `Break` and `Continue`, function boundaries consume `Return`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ControlSignal {
    /// Carry on with the next statement
    #[default]
    Normal,
    Return(Value),
    Break,
    Continue,
}

impl ControlSignal {
    pub fn is_normal(&self) -> bool {
        matches!(self, ControlSignal::Normal)
    }

    /// The returned value, if this is a return
    pub fn return_value(&self) -> Option<&Value> {
        match self {
            ControlSignal::Return(value) => Some(value),
            _ => None,
        }
    }

    /// Value a function body produces: the returned value, or null when it fell off the end
    pub fn into_value(self) -> Value {
        match self {
            ControlSignal::Return(value) => value,
            _ => Value::Null,
        }
    }
}
