use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, PoisonError, RwLock};

/// Error type converters may return.
pub type ConvertError = Box<dyn Error + Send + Sync>;

/// A named transform producing an alternate representation of a logged value.
///
/// The value is handed over as `&dyn Any`; converters downcast to the types
/// they understand and return `Ok(None)` for everything else.
pub type Converter = dyn Fn(&dyn Any) -> Result<Option<Value>, ConvertError> + Send + Sync;

/// Prefix used in place of a converter's output when it fails.
pub const CONVERT_ERROR_PREFIX: &str = "UNABLE TO CONVERT: ";

/// Append-only set of named converters applied to every logged value.
///
/// Registration and lookup are synchronized; converters themselves run
/// outside the lock, so a converter may log or register without deadlocking.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: RwLock<BTreeMap<String, Arc<Converter>>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `convert` under `name`, replacing any converter already
    /// registered with that name.
    pub fn register<F>(&self, name: impl Into<String>, convert: F)
    where
        F: Fn(&dyn Any) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static,
    {
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(convert));
    }

    pub fn len(&self) -> usize {
        self.converters.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered converter against `value`.
    ///
    /// Converters returning `None` contribute no entry. A failing converter
    /// contributes `"UNABLE TO CONVERT: <error>"`.
    pub fn apply_all(&self, value: &dyn Any) -> BTreeMap<String, Value> {
        let snapshot: Vec<(String, Arc<Converter>)> = self
            .converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, convert)| (name.clone(), Arc::clone(convert)))
            .collect();

        let mut converted = BTreeMap::new();
        for (name, convert) in snapshot {
            match convert(value) {
                Ok(Some(output)) => {
                    converted.insert(name, output);
                }
                Ok(None) => {}
                Err(e) => {
                    converted.insert(name, Value::String(format!("{}{}", CONVERT_ERROR_PREFIX, e)));
                }
            }
        }
        converted
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let converters = self.converters.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ConverterRegistry")
            .field("names", &converters.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prefix_strings(value: &dyn Any) -> Result<Option<Value>, ConvertError> {
        Ok(value.downcast_ref::<&str>().map(|s| json!(format!("123{}", s))))
    }

    #[test]
    fn empty_registry_converts_nothing() {
        let registry = ConverterRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.apply_all(&"data").is_empty());
    }

    #[test]
    fn converter_output_is_keyed_by_name() {
        let registry = ConverterRegistry::new();
        registry.register("myconverter", prefix_strings);

        assert_eq!(registry.apply_all(&"data").get("myconverter"), Some(&json!("123data")));
        assert!(registry.apply_all(&1_i32).is_empty());
    }

    #[test]
    fn failing_converter_yields_error_string() {
        let registry = ConverterRegistry::new();
        registry.register("broken", |_: &dyn Any| Err("boom".into()));

        let converted = registry.apply_all(&"data");
        assert_eq!(converted["broken"], json!("UNABLE TO CONVERT: boom"));
    }

    #[test]
    fn reregistering_a_name_overwrites() {
        let registry = ConverterRegistry::new();
        registry.register("c", |_: &dyn Any| Ok(Some(json!(1))));
        registry.register("c", |_: &dyn Any| Ok(Some(json!(2))));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.apply_all(&()).get("c"), Some(&json!(2)));
    }

    #[test]
    fn converter_may_register_while_running() {
        let registry = Arc::new(ConverterRegistry::new());
        let inner = Arc::clone(&registry);
        registry.register("outer", move |_: &dyn Any| {
            inner.register("late", |_: &dyn Any| Ok(None));
            Ok(None)
        });

        registry.apply_all(&"data");
        assert_eq!(registry.len(), 2);
    }
}
