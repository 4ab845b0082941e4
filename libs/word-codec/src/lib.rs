//! Register word codec
//!
//! Pure, stateless conversion between typed application values and ordered
//! sequences of 16-bit protocol words.
//!
//! # Design Principles
//!
//! - **Protocol-agnostic**: No transport or function-code logic
//! - **Type-safe**: `DataType` and `WordOrder` enums instead of strings
//! - **Fail loudly**: Out-of-range values are rejected, never saturated
//!
//! # Example
//!
//! ```
//! use word_codec::{decode, encode, DataType, RegisterFormat, RegisterValue, WordOrder};
//!
//! let format = RegisterFormat::new(DataType::Int32, WordOrder::Big);
//! let words = encode(&format, &RegisterValue::Int(-2)).unwrap();
//! assert_eq!(words, vec![0xFFFF, 0xFFFE]);
//! assert_eq!(decode(&format, &words).unwrap(), RegisterValue::Int(-2));
//! ```

pub mod codec;
pub mod conversions;
pub mod data_type;
pub mod error;
pub mod value;
pub mod word_order;

pub use codec::{decode, encode, size_of, RegisterFormat};
pub use data_type::DataType;
pub use error::{CodecError, Result};
pub use value::RegisterValue;
pub use word_order::WordOrder;
