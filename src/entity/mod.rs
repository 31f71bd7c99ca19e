pub mod cart_items;
pub mod charges;
pub mod items;
pub mod order_items;
pub mod orders;
pub mod users;

pub use cart_items::Entity as CartItems;
pub use charges::Entity as Charges;
pub use items::Entity as Items;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use users::Entity as Users;
