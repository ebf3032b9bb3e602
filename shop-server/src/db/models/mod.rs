//! Database Models
//!
//! Serde structs mirroring the SurrealDB tables.

pub mod order;
pub mod payment;
pub mod product;

pub use order::{
    Order, OrderId, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, Shipping,
};
pub use payment::{Payment, PaymentId, PaymentState};
pub use product::{Product, ProductCreate, ProductFull, ProductId, ProductUpdate, Variant, VariantId, VariantInput};
