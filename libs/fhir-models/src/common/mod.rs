//! Datatypes shared by every resource

pub mod complex;
pub mod primitive;
pub mod reference;

pub use complex::{
    is_choice_suffix, ChoiceValue, ComplexType, Extension, Identifier, IntegerType, SystemValue,
    TextType, WireOrder,
};
pub use primitive::Primitive;
pub use reference::{ParsedReference, Reference};
