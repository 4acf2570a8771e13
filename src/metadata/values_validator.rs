//! Backend-agnostic validation of metadata values.
//!
//! A [`MetadataValuesValidator`] checks the values of one property, given
//! a [`MetadataPropertyModel`] and a function that produces the keys of
//! all values. The key sequence is produced anew for every pass, so that
//! no pass has to keep the values of all keys in memory.
//!
//! Issues are added to the [`ValidationContext`]. An `Err` is only
//! returned when a value could not be read at all, which indicates that
//! the structure of the property has not been validated properly.

use super::model::MetadataPropertyModel;
use crate::structure::PropertyType;
use crate::util::{any_deep_greater_than, any_deep_less_than, deep_equals, deep_max, deep_min, MetadataValue, Result};
use crate::validation::{IssueType, ValidationContext};

/// Validates the values of one property model over a key sequence.
pub struct MetadataValuesValidator<'m, M, K> {
    model: &'m M,
    keys: K,
}

impl<'m, M, K, I> MetadataValuesValidator<'m, M, K>
where
    M: MetadataPropertyModel,
    K: Fn() -> I,
    I: Iterator<Item = M::Key>,
{
    pub fn new(model: &'m M, keys: K) -> Self {
        Self { model, keys }
    }

    fn property_name(&self) -> &str {
        &self.model.descriptor().name
    }

    /// Run all checks that apply to the property, in this order: enum
    /// codes, class minimum, usage minimum, class maximum, usage maximum.
    ///
    /// A usage bound that is not violated must still equal the computed
    /// extremum of all values.
    pub fn validate_property_values(&self, path: &str, context: &mut ValidationContext) -> Result<bool> {
        let descriptor = self.model.descriptor();
        let mut result = true;

        if descriptor.property_type == PropertyType::Enum && !self.validate_enum_values(path, context)? {
            result = false;
        }
        if !descriptor.property_type.is_numeric() {
            return Ok(result);
        }

        let class_min = descriptor.class_property.min.as_ref().and_then(MetadataValue::from_json);
        if let Some(min) = &class_min {
            if !self.validate_min(path, min, "class property", context)? {
                result = false;
            }
        }
        if let Some(min) = &descriptor.overrides.min {
            let source = format!("{} property", M::SOURCE);
            if !self.validate_min(path, min, &source, context)? {
                result = false;
            } else {
                let computed = self.compute_min()?;
                if !self.check_tight_bound(path, "minimum", min, computed.as_ref(), context) {
                    result = false;
                }
            }
        }

        let class_max = descriptor.class_property.max.as_ref().and_then(MetadataValue::from_json);
        if let Some(max) = &class_max {
            if !self.validate_max(path, max, "class property", context)? {
                result = false;
            }
        }
        if let Some(max) = &descriptor.overrides.max {
            let source = format!("{} property", M::SOURCE);
            if !self.validate_max(path, max, &source, context)? {
                result = false;
            } else {
                let computed = self.compute_max()?;
                if !self.check_tight_bound(path, "maximum", max, computed.as_ref(), context) {
                    result = false;
                }
            }
        }
        Ok(result)
    }

    fn check_tight_bound(
        &self,
        path: &str,
        what: &str,
        defined: &MetadataValue,
        computed: Option<&MetadataValue>,
        context: &mut ValidationContext,
    ) -> bool {
        if computed.is_some_and(|c| deep_equals(c, defined)) {
            return true;
        }
        let computed = computed.map_or_else(|| "undefined".to_string(), |c| c.to_string());
        context.report(
            IssueType::MetadataValueMismatch,
            path,
            format!(
                "For property '{}', the {} property defines a {} of {}, but the computed {} value is {}",
                self.property_name(),
                M::SOURCE,
                what,
                defined,
                what,
                computed
            ),
        );
        false
    }

    /// Check that every raw value (or every element of an array value)
    /// is one of the codes that the enum declares.
    ///
    /// One issue is added per offending value. Issues for array elements
    /// get the element index appended to the path.
    pub fn validate_enum_values(&self, path: &str, context: &mut ValidationContext) -> Result<bool> {
        let descriptor = self.model.descriptor();
        let Some(names) = &descriptor.enum_names else {
            return Ok(true);
        };
        let mut valid_codes: Vec<i64> = names.keys().copied().collect();
        valid_codes.sort_unstable();
        let list = valid_codes.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ");

        let mut result = true;
        let mut check = |value: &MetadataValue, path: &str, key: M::Key, context: &mut ValidationContext| {
            let valid = value
                .as_number()
                .is_some_and(|n| n.fract() == 0.0 && names.contains_key(&(n as i64)));
            if !valid {
                context.report(
                    IssueType::ValueNotInList,
                    path,
                    format!(
                        "The value of property '{}' in the {} at {} {} must be one of [{}], but is {}",
                        descriptor.name,
                        M::SOURCE,
                        M::KEY_NAME,
                        key,
                        list,
                        value
                    ),
                );
                result = false;
            }
        };
        for key in (self.keys)() {
            let raw = self.model.raw_property_value(key)?;
            match &raw {
                MetadataValue::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        check(item, &format!("{}/{}", path, i), key, context);
                    }
                }
                value => check(value, path, key, context),
            }
        }
        Ok(result)
    }

    /// Check that no processed value is smaller than `defined_min`.
    ///
    /// `source` names where the minimum was declared, e.g. `class property`.
    pub fn validate_min(
        &self,
        path: &str,
        defined_min: &MetadataValue,
        source: &str,
        context: &mut ValidationContext,
    ) -> Result<bool> {
        self.validate_bound(path, defined_min, source, "minimum", any_deep_less_than, context)
    }

    /// Check that no processed value is greater than `defined_max`.
    pub fn validate_max(
        &self,
        path: &str,
        defined_max: &MetadataValue,
        source: &str,
        context: &mut ValidationContext,
    ) -> Result<bool> {
        self.validate_bound(path, defined_max, source, "maximum", any_deep_greater_than, context)
    }

    fn validate_bound(
        &self,
        path: &str,
        bound: &MetadataValue,
        source: &str,
        what: &str,
        violates: fn(&MetadataValue, &MetadataValue) -> bool,
        context: &mut ValidationContext,
    ) -> Result<bool> {
        let mut result = true;
        for key in (self.keys)() {
            let raw = self.model.raw_property_value(key)?;
            let value = self.model.descriptor().process(raw.clone())?;
            if violates(&value, bound) {
                context.report(
                    IssueType::MetadataValueNotInRange,
                    path,
                    format!(
                        "For property '{}', the {} defines a {} of {}, but the value in the {} at {} {} is {}",
                        self.property_name(),
                        source,
                        what,
                        bound,
                        M::SOURCE,
                        M::KEY_NAME,
                        key,
                        self.value_message_part(&raw, &value)
                    ),
                );
                result = false;
            }
        }
        Ok(result)
    }

    /// Describe a processed value together with the raw value, the
    /// normalization and the scale and offset of the property usage.
    fn value_message_part(&self, raw: &MetadataValue, value: &MetadataValue) -> String {
        let descriptor = self.model.descriptor();
        let mut steps = Vec::new();
        if descriptor.class_property.normalized {
            steps.push("normalization".to_string());
        }
        if let Some(scale) = &descriptor.overrides.scale {
            steps.push(format!("scale {}", scale));
        }
        if let Some(offset) = &descriptor.overrides.offset {
            steps.push(format!("offset {}", offset));
        }
        if steps.is_empty() {
            return value.to_string();
        }
        format!("{} (raw value {}, after {})", value, raw, steps.join(", "))
    }

    /// Element-wise minimum of all processed values, `None` without keys.
    pub fn compute_min(&self) -> Result<Option<MetadataValue>> {
        self.fold(deep_min)
    }

    /// Element-wise maximum of all processed values, `None` without keys.
    pub fn compute_max(&self) -> Result<Option<MetadataValue>> {
        self.fold(deep_max)
    }

    fn fold(&self, f: fn(&MetadataValue, &MetadataValue) -> MetadataValue) -> Result<Option<MetadataValue>> {
        let mut acc: Option<MetadataValue> = None;
        for key in (self.keys)() {
            let value = self.model.property_value(key)?;
            acc = Some(match acc {
                Some(a) => f(&a, &value),
                None => value,
            });
        }
        Ok(acc)
    }
}
