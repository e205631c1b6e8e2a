use xrepo_error::Result;

use crate::{ToValue, Value};

/// Predicate text plus its positional parameters
///
/// The predicate is plain SQL with `?` placeholders, the parameters are bound in order.
///
/// # Examples
///
/// ```
/// use xrepo_conn::{Filter, Value};
///
/// let filter = Filter::new("name LIKE ? AND age > ?").bind("%John%").bind(18u32);
///
/// assert_eq!(filter.predicate(), "name LIKE ? AND age > ?");
/// assert_eq!(filter.params(), &[Value::Str("%John%".into()), Value::U32(18)]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    predicate: String,
    params: Vec<Value>,
}

impl Filter {
    pub fn new<S: Into<String>>(predicate: S) -> Self {
        Self {
            predicate: predicate.into(),
            params: vec![],
        }
    }

    /// Append one positional parameter
    pub fn bind<T: ToValue>(mut self, value: T) -> Self {
        self.params.push(value.to_value());
        self
    }

    /// Build from a flat argument list, the first element is the predicate
    ///
    /// # Examples
    ///
    /// ```
    /// use xrepo_conn::{Filter, Value};
    ///
    /// let filter = Filter::from_args(vec![Value::Str("id = ?".into()), Value::U32(1)]).unwrap();
    /// assert_eq!(filter, Filter::new("id = ?").bind(1u32));
    ///
    /// assert!(Filter::from_args(vec![]).is_err());
    /// assert!(Filter::from_args(vec![Value::U32(1)]).is_err());
    /// ```
    pub fn from_args(args: Vec<Value>) -> Result<Self> {
        let mut iter = args.into_iter();
        match iter.next() {
            Some(Value::Str(predicate)) => Ok(Self {
                predicate,
                params: iter.collect(),
            }),
            Some(v) => Err(xrepo_error::argument!(
                "Filter predicate must be a string, got {:?}",
                v
            )),
            None => Err(xrepo_error::argument!("Filter requires a predicate")),
        }
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Reject predicates that contain nothing to evaluate
    pub fn validate(&self) -> Result<()> {
        if self.predicate.trim().is_empty() {
            return Err(xrepo_error::argument!("Empty filter predicate"));
        }

        Ok(())
    }
}

impl TryFrom<Vec<Value>> for Filter {
    type Error = xrepo_error::Error;

    fn try_from(args: Vec<Value>) -> Result<Self> {
        Self::from_args(args)
    }
}

/// Build a [`Filter`] from a predicate and its parameters
///
/// # Examples
///
/// ```
/// use xrepo_conn::{filter, Filter};
///
/// assert_eq!(
///     filter!("name LIKE ? AND age > ?", "%John%", 18u32),
///     Filter::new("name LIKE ? AND age > ?").bind("%John%").bind(18u32),
/// );
/// ```
#[macro_export]
macro_rules! filter {
    ($pred:expr $(, $param:expr)* $(,)?) => {
        $crate::Filter::new($pred)$(.bind($param))*
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(Filter::new("id = ?").bind(1u32).validate().is_ok());
        assert!(Filter::new("").validate().is_err());
        assert!(Filter::new("   ").validate().is_err());
    }

    #[test]
    fn test_try_from() {
        let filter = Filter::try_from(vec![Value::Str("a > 1".into())]).unwrap();
        assert_eq!(filter.predicate(), "a > 1");
        assert!(filter.params().is_empty());
    }
}
