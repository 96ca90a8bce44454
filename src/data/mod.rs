pub mod field;
pub mod frame;
pub mod value;

pub use field::{Field, FieldType, FieldValues, Labels};
pub use frame::{Frame, FrameError};
pub use value::Value;
