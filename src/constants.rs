pub const RECIPE_BATCH_SIZE: i64 = 50;
pub const DEFAULT_RECIPES_LIMIT: usize = 3;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_COMPONENT_AMOUNT: i32 = 1;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const RECIPE_TITLE_MAX_LENGTH: usize = 200;
pub const TAG_NAME_MAX_LENGTH: usize = 20;
pub const TAG_SLUG_MAX_LENGTH: usize = 20;

pub const SHOPPING_LIST_FILE_NAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_HEADER: &str = "Shopping list";

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
