//! Parameter binding.
//!
//! A query's parameters arrive as one of three carriers: nothing, an
//! entity's own fields, or a dynamic name/value bag built at the call
//! site. All three funnel through the same per-value conversion order:
//! a registered handler first, then — for anything array-shaped other
//! than a byte string — per-element conversion into a `DbValue::Array`,
//! then the built-in default conversion. Parameter order always follows
//! carrier enumeration order; names are passed through verbatim, with
//! no case conversion (unlike column matching in the decoder).

use std::any::Any;

use crate::driver::{Command, DbTypeHint, DbValue, Parameter};
use crate::error::MapperResult;
use crate::handlers::enum_handler::DbEnum;
use crate::handlers::HandlerRegistry;

/// A value usable as a bound parameter.
pub trait BindableParam: Send + Sync + 'static {
    /// The built-in conversion used when no handler is registered.
    fn to_db_value(&self) -> DbValue;

    fn default_hint() -> DbTypeHint
    where
        Self: Sized,
    {
        DbTypeHint::Auto
    }

    /// Writes the built-in conversion into `param`. Overridden only by
    /// the array special case, which needs per-element handler
    /// resolution rather than a single flat conversion.
    fn bind_default(&self, param: &mut dyn Parameter, _registry: &HandlerRegistry) -> MapperResult<()>
    where
        Self: Sized,
    {
        param.set_value(self.to_db_value());
        param.set_type_hint(Self::default_hint());
        Ok(())
    }
}

/// Handler-first, then the type's own conversion. Every other entry
/// point in this module funnels through here,
/// including nested array elements, so an enum wrapped in `Option`, or
/// appearing inside a `Vec`, still picks up its registered handler.
pub(crate) fn bind_value<T: BindableParam>(
    param: &mut dyn Parameter,
    registry: &HandlerRegistry,
    value: &T,
) -> MapperResult<()> {
    if let Some(handler) = registry.try_get::<T>() {
        return handler.set_dyn(param, value as &dyn Any);
    }
    value.bind_default(param, registry)
}

struct CapturingParameter {
    value: DbValue,
    hint: DbTypeHint,
}

impl Parameter for CapturingParameter {
    fn set_name(&mut self, _name: &str) {}
    fn set_value(&mut self, value: DbValue) {
        self.value = value;
    }
    fn set_type_hint(&mut self, hint: DbTypeHint) {
        self.hint = hint;
    }
    fn name(&self) -> &str {
        ""
    }
    fn value(&self) -> &DbValue {
        &self.value
    }
    fn type_hint(&self) -> DbTypeHint {
        self.hint
    }
}

/// Converts a bound value straight to a [`DbValue`], for use inside an
/// array element where there is no live driver [`Parameter`] to write
/// into.
fn convert_to_db_value<T: BindableParam>(value: &T, registry: &HandlerRegistry) -> MapperResult<DbValue> {
    let mut capture = CapturingParameter {
        value: DbValue::Null,
        hint: DbTypeHint::Auto,
    };
    bind_value(&mut capture, registry, value)?;
    Ok(capture.value)
}

// --- built-in conversions ----------------------------------------------

macro_rules! impl_bindable_scalar {
    ($t:ty, $variant:expr, $hint:expr) => {
        impl BindableParam for $t {
            fn to_db_value(&self) -> DbValue {
                $variant(self.clone())
            }
            fn default_hint() -> DbTypeHint {
                $hint
            }
        }
    };
}

impl BindableParam for bool {
    fn to_db_value(&self) -> DbValue {
        DbValue::Bool(*self)
    }
    fn default_hint() -> DbTypeHint {
        DbTypeHint::Bool
    }
}

impl BindableParam for i16 {
    fn to_db_value(&self) -> DbValue {
        DbValue::I16(*self)
    }
    fn default_hint() -> DbTypeHint {
        DbTypeHint::SmallInt
    }
}

impl BindableParam for i32 {
    fn to_db_value(&self) -> DbValue {
        DbValue::I32(*self)
    }
    fn default_hint() -> DbTypeHint {
        DbTypeHint::Int
    }
}

impl BindableParam for i64 {
    fn to_db_value(&self) -> DbValue {
        DbValue::I64(*self)
    }
    fn default_hint() -> DbTypeHint {
        DbTypeHint::BigInt
    }
}

impl BindableParam for f32 {
    fn to_db_value(&self) -> DbValue {
        DbValue::F32(*self)
    }
    fn default_hint() -> DbTypeHint {
        DbTypeHint::Real
    }
}

impl BindableParam for f64 {
    fn to_db_value(&self) -> DbValue {
        DbValue::F64(*self)
    }
    fn default_hint() -> DbTypeHint {
        DbTypeHint::Double
    }
}

impl_bindable_scalar!(rust_decimal::Decimal, DbValue::Decimal, DbTypeHint::Decimal);
impl_bindable_scalar!(String, DbValue::Str, DbTypeHint::Text);
impl_bindable_scalar!(uuid::Uuid, DbValue::Uuid, DbTypeHint::Uuid);
impl_bindable_scalar!(chrono::NaiveDate, DbValue::Date, DbTypeHint::Date);
impl_bindable_scalar!(chrono::NaiveTime, DbValue::Time, DbTypeHint::Time);
impl_bindable_scalar!(chrono::NaiveDateTime, DbValue::DateTime, DbTypeHint::DateTime);
impl_bindable_scalar!(
    chrono::DateTime<chrono::Utc>,
    DbValue::DateTimeUtc,
    DbTypeHint::DateTime
);
impl_bindable_scalar!(serde_json::Value, DbValue::Json, DbTypeHint::Json);

impl BindableParam for Vec<u8> {
    fn to_db_value(&self) -> DbValue {
        DbValue::Bytes(self.clone())
    }
    fn default_hint() -> DbTypeHint {
        DbTypeHint::Binary
    }
}

impl<T: BindableParam> BindableParam for Option<T> {
    fn to_db_value(&self) -> DbValue {
        match self {
            Some(v) => v.to_db_value(),
            None => DbValue::Null,
        }
    }

    fn default_hint() -> DbTypeHint {
        T::default_hint()
    }

    fn bind_default(&self, param: &mut dyn Parameter, registry: &HandlerRegistry) -> MapperResult<()> {
        match self {
            Some(v) => bind_value(param, registry, v),
            None => {
                param.set_value(DbValue::Null);
                param.set_type_hint(T::default_hint());
                Ok(())
            }
        }
    }
}

/// Any array-shaped value other than a byte string binds as a
/// `DbValue::Array` of per-element conversions — used for
/// set-membership predicates (`name = ANY($1)`).
impl<T: BindableParam> BindableParam for Vec<T> {
    fn to_db_value(&self) -> DbValue {
        DbValue::Array(self.iter().map(|v| v.to_db_value()).collect())
    }

    fn default_hint() -> DbTypeHint {
        DbTypeHint::Array
    }

    fn bind_default(&self, param: &mut dyn Parameter, registry: &HandlerRegistry) -> MapperResult<()> {
        let mut elements = Vec::with_capacity(self.len());
        for item in self {
            elements.push(convert_to_db_value(item, registry)?);
        }
        param.set_value(DbValue::Array(elements));
        param.set_type_hint(DbTypeHint::Array);
        Ok(())
    }
}

/// Built-in conversion for any [`DbEnum`], called from the concrete impl
/// [`crate::impl_db_enum_mapping`] generates. Not a blanket
/// `impl<E: DbEnum> BindableParam for E` — see [`crate::coltype::decode_enum_value`]
/// for why that would conflict with the impls above.
pub fn encode_enum_value<E: DbEnum>(value: &E) -> DbValue {
    DbValue::Str(value.db_name().to_string())
}

// --- parameter carriers --------------------------------------------------

/// Source of bound parameters for one execution. Implemented for `()`
/// (the "nothing" carrier), [`ParamBag`] (the dynamic name/value bag),
/// and, via a blanket impl, for any [`BindableEntity`] (the "record
/// fields" carrier).
pub trait ParamSource {
    fn bind_all(&self, command: &mut dyn Command, registry: &HandlerRegistry) -> MapperResult<()>;
}

impl ParamSource for () {
    fn bind_all(&self, _command: &mut dyn Command, _registry: &HandlerRegistry) -> MapperResult<()> {
        Ok(())
    }
}

struct BagEntry {
    name: String,
    bind: Box<dyn Fn(&mut dyn Parameter, &HandlerRegistry) -> MapperResult<()> + Send + Sync>,
}

/// A dynamic, ordered name/value parameter bag.
#[derive(Default)]
pub struct ParamBag {
    entries: Vec<BagEntry>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Appends a parameter. Parameters bind in the order they are added.
    pub fn add<T: BindableParam>(mut self, name: impl Into<String>, value: T) -> Self {
        self.entries.push(BagEntry {
            name: name.into(),
            bind: Box::new(move |param, registry| bind_value(param, registry, &value)),
        });
        self
    }
}

impl ParamSource for ParamBag {
    fn bind_all(&self, command: &mut dyn Command, registry: &HandlerRegistry) -> MapperResult<()> {
        for entry in &self.entries {
            let mut param = command.create_parameter();
            param.set_name(&entry.name);
            (entry.bind)(param.as_mut(), registry)?;
            command.add_parameter(param);
        }
        Ok(())
    }
}

/// One field of an entity used as the "record fields" parameter carrier.
pub struct BindableField<P> {
    name: &'static str,
    bind: Box<dyn Fn(&P, &mut dyn Parameter, &HandlerRegistry) -> MapperResult<()> + Send + Sync>,
}

impl<P: 'static> BindableField<P> {
    pub fn new<T: BindableParam>(name: &'static str, getter: impl Fn(&P) -> T + Send + Sync + 'static) -> Self {
        Self {
            name,
            bind: Box::new(move |instance, param, registry| {
                let value = getter(instance);
                bind_value(param, registry, &value)
            }),
        }
    }
}

/// An entity whose own fields are bound directly as parameters, in
/// field-declaration order.
pub trait BindableEntity: Sized + 'static {
    fn bindable_fields() -> Vec<BindableField<Self>>;
}

impl<P: BindableEntity> ParamSource for P {
    fn bind_all(&self, command: &mut dyn Command, registry: &HandlerRegistry) -> MapperResult<()> {
        for field in P::bindable_fields() {
            let mut param = command.create_parameter();
            param.set_name(field.name);
            (field.bind)(self, param.as_mut(), registry)?;
            command.add_parameter(param);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{HandlerRegistry, TypeHandler};

    struct RecordingParameter {
        name: String,
        value: DbValue,
        hint: DbTypeHint,
    }

    impl Default for RecordingParameter {
        fn default() -> Self {
            Self {
                name: String::new(),
                value: DbValue::Null,
                hint: DbTypeHint::Auto,
            }
        }
    }

    impl Parameter for RecordingParameter {
        fn set_name(&mut self, name: &str) {
            self.name = name.to_string();
        }
        fn set_value(&mut self, value: DbValue) {
            self.value = value;
        }
        fn set_type_hint(&mut self, hint: DbTypeHint) {
            self.hint = hint;
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn value(&self) -> &DbValue {
            &self.value
        }
        fn type_hint(&self) -> DbTypeHint {
            self.hint
        }
    }

    #[test]
    fn default_scalar_conversion() {
        let registry = HandlerRegistry::new();
        let mut param = RecordingParameter::default();
        bind_value(&mut param, &registry, &42i32).unwrap();
        assert_eq!(param.value, DbValue::I32(42));
        assert_eq!(param.hint, DbTypeHint::Int);
    }

    #[test]
    fn none_binds_null_with_underlying_hint() {
        let registry = HandlerRegistry::new();
        let mut param = RecordingParameter::default();
        let value: Option<i64> = None;
        bind_value(&mut param, &registry, &value).unwrap();
        assert_eq!(param.value, DbValue::Null);
        assert_eq!(param.hint, DbTypeHint::BigInt);
    }

    #[test]
    fn vec_binds_as_array_of_elements() {
        let registry = HandlerRegistry::new();
        let mut param = RecordingParameter::default();
        bind_value(&mut param, &registry, &vec![1i32, 2, 3]).unwrap();
        assert_eq!(
            param.value,
            DbValue::Array(vec![DbValue::I32(1), DbValue::I32(2), DbValue::I32(3)])
        );
    }

    #[test]
    fn byte_vec_binds_as_bytes_not_array() {
        let registry = HandlerRegistry::new();
        let mut param = RecordingParameter::default();
        bind_value(&mut param, &registry, &vec![1u8, 2, 3]).unwrap();
        assert_eq!(param.value, DbValue::Bytes(vec![1, 2, 3]));
    }

    struct ShoutingHandler;
    impl TypeHandler<String> for ShoutingHandler {
        fn set(&self, param: &mut dyn Parameter, value: &String) -> MapperResult<()> {
            param.set_value(DbValue::Str(value.to_uppercase()));
            param.set_type_hint(DbTypeHint::Text);
            Ok(())
        }
        fn parse(&self, raw: &DbValue) -> MapperResult<String> {
            match raw {
                DbValue::Str(s) => Ok(s.clone()),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn registered_handler_takes_priority_over_default_conversion() {
        let registry = HandlerRegistry::new();
        registry.register::<String, _>(ShoutingHandler);
        let mut param = RecordingParameter::default();
        bind_value(&mut param, &registry, &"hi".to_string()).unwrap();
        assert_eq!(param.value, DbValue::Str("HI".to_string()));
    }

    #[test]
    fn handler_is_honoured_inside_option() {
        let registry = HandlerRegistry::new();
        registry.register::<String, _>(ShoutingHandler);
        let mut param = RecordingParameter::default();
        let value: Option<String> = Some("hi".to_string());
        bind_value(&mut param, &registry, &value).unwrap();
        assert_eq!(param.value, DbValue::Str("HI".to_string()));
    }

    #[test]
    fn handler_is_honoured_inside_array_elements() {
        let registry = HandlerRegistry::new();
        registry.register::<String, _>(ShoutingHandler);
        let mut param = RecordingParameter::default();
        bind_value(&mut param, &registry, &vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(
            param.value,
            DbValue::Array(vec![DbValue::Str("A".to_string()), DbValue::Str("B".to_string())])
        );
    }
}
