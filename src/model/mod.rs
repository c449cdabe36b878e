pub mod component;
pub mod controller;
pub mod diagnostic;
pub mod template;

pub use component::{Binding, BindingMode, Component, DEFAULT_CONTROLLER_AS};
pub use controller::{Accessibility, Controller, Member, MemberKind, Parameter, TypeTag};
pub use diagnostic::{Diagnostic, Severity};
pub use template::Template;
