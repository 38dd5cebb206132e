use serde::Serialize;

use crate::constants::{SHOPPING_LIST_FILE_NAME, SHOPPING_LIST_HEADER};

use super::schema::ShoppingListEntry;

/*
Shopping list export

Shopping list

* eggs - 5 pcs
* flour - 1 cup
*/

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShoppingListFile {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListDocument {
    pub entries: Vec<ShoppingListEntry>,
}

impl ShoppingListDocument {
    pub fn new(entries: Vec<ShoppingListEntry>) -> Self {
        Self { entries }
    }

    pub fn render_line(entry: &ShoppingListEntry) -> String {
        format!(
            "* {} - {} {}",
            entry.name, entry.amount, entry.measurement_unit
        )
    }

    pub fn into_file(self) -> ShoppingListFile {
        ShoppingListFile {
            file_name: SHOPPING_LIST_FILE_NAME.to_owned(),
            content: self.into(),
        }
    }
}

impl From<ShoppingListDocument> for String {
    fn from(document: ShoppingListDocument) -> Self {
        let mut s = format!("{SHOPPING_LIST_HEADER}\r\n\r\n");

        document.entries.iter().for_each(|entry| {
            s += &ShoppingListDocument::render_line(entry);
            s += "\r\n";
        });

        s
    }
}
