use std::collections::HashMap;

use serde_json::Value;

use super::{
    error::TypeError,
    schema::{ComponentDraft, Id, RecipeDraft},
};

pub type FormData = HashMap<String, Value>;

pub struct Form {
    inner: HashMap<String, Value>,
}

/// Accepts either a JSON number or a numeric string.
fn value_as_i32(value: &Value) -> Result<i32, TypeError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| TypeError::new("Invalid type conversion")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_e| TypeError::new("Invalid type conversion")),
        _ => Err(TypeError::new("Failed to parse value as number")),
    }
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    fn get(&self, key: &str) -> Result<&Value, TypeError> {
        self.inner
            .get(key)
            .ok_or_else(|| TypeError::new(&format!("Missing key: {key}")))
    }

    pub fn get_number(&self, key: &str) -> Result<i32, TypeError> {
        value_as_i32(self.get(key)?)
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.get(key)?.as_str() {
            Some(v) => Ok(v.to_owned()),
            None => Err(TypeError::new(&format!("Failed to parse {key} as str"))),
        }
    }

    pub fn get_array(&self, key: &str) -> Result<&Vec<Value>, TypeError> {
        self.get(key)?
            .as_array()
            .ok_or_else(|| TypeError::new(&format!("Failed to parse {key} as list")))
    }
}

impl TryFrom<Form> for RecipeDraft {
    type Error = TypeError;

    /// Reads the recipe write payload: `name`, `text`, `image`,
    /// `cooking_time`, `tags` (ids) and `ingredients` (`{id, amount}` objects).
    fn try_from(form: Form) -> Result<Self, Self::Error> {
        let tags = form
            .get_array("tags")?
            .iter()
            .map(value_as_i32)
            .collect::<Result<Vec<Id>, TypeError>>()?;

        let components = form
            .get_array("ingredients")?
            .iter()
            .map(|ingredient| {
                let object = ingredient
                    .as_object()
                    .ok_or_else(|| TypeError::new("Invalid ingredient"))?;
                let product_id = object
                    .get("id")
                    .ok_or_else(|| TypeError::new("Ingredient is missing id"))
                    .and_then(value_as_i32)?;
                let amount = object
                    .get("amount")
                    .ok_or_else(|| TypeError::new("Ingredient is missing amount"))
                    .and_then(value_as_i32)?;

                Ok(ComponentDraft { product_id, amount })
            })
            .collect::<Result<Vec<ComponentDraft>, TypeError>>()?;

        Ok(Self {
            title: form.get_str("name")?,
            text: form.get_str("text")?,
            picture: form.get_str("image")?,
            cooking_time: form.get_number("cooking_time")?,
            tags,
            components,
        })
    }
}
