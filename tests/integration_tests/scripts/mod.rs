#[path = "mod_products.rs"]
mod products_tests;
#[path = "mod_users.rs"]
mod users_tests;
