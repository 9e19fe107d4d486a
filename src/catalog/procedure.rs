use crate::core::DataType;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    In,
    InOut,
    Out,
}

impl fmt::Display for ParamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::InOut => write!(f, "INOUT"),
            Self::Out => write!(f, "OUT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureParam {
    pub direction: ParamDirection,
    pub name: String,
    pub data_type: DataType,
    /// Accepts any number of trailing arguments. Only valid on the last parameter.
    pub variadic: bool,
}

impl ProcedureParam {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            direction: ParamDirection::In,
            name: name.into(),
            data_type,
            variadic: false,
        }
    }

    pub fn direction(mut self, direction: ParamDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

/// Number of arguments a procedure accepts.
///
/// `Variadic` orders above every fixed count, so the greatest arity of a set
/// of overloads is always the variadic one when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{}", n),
            Self::Variadic => write!(f, "variadic"),
        }
    }
}

/// A stored procedure definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    pub name: String,
    pub definer: String,
    pub params: Vec<ProcedureParam>,
    pub comment: String,
    /// Body text as written in CREATE PROCEDURE.
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Procedure {
    pub fn new(name: impl Into<String>, params: Vec<ProcedureParam>, body: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            definer: String::new(),
            params,
            comment: String::new(),
            body: body.into(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_definer(mut self, definer: impl Into<String>) -> Self {
        self.definer = definer.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn has_variadic_parameter(&self) -> bool {
        self.params.last().is_some_and(|param| param.variadic)
    }

    pub fn arity(&self) -> Arity {
        if self.has_variadic_parameter() {
            Arity::Variadic
        } else {
            Arity::Fixed(self.params.len())
        }
    }

    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|param| {
                let suffix = if param.variadic { "..." } else { "" };
                format!("{} {} {}{}", param.direction, param.name, param.data_type, suffix)
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, params)
    }
}

/// Order used to pick the fallback overload: variadic first, then the most
/// declared parameters, then the signature text.
pub fn compare_overloads(a: &Procedure, b: &Procedure) -> Ordering {
    a.has_variadic_parameter()
        .cmp(&b.has_variadic_parameter())
        .then_with(|| a.params.len().cmp(&b.params.len()))
        .then_with(|| a.signature().cmp(&b.signature()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        let fixed = Procedure::new(
            "p",
            vec![ProcedureParam::new("a", DataType::Int64), ProcedureParam::new("b", DataType::Text)],
            "BEGIN END",
        );
        assert_eq!(fixed.arity(), Arity::Fixed(2));

        let variadic = Procedure::new(
            "p",
            vec![ProcedureParam::new("a", DataType::Int64).variadic()],
            "BEGIN END",
        );
        assert!(variadic.has_variadic_parameter());
        assert_eq!(variadic.arity(), Arity::Variadic);
        assert!(Arity::Variadic > Arity::Fixed(usize::MAX));
    }

    #[test]
    fn test_signature_and_ordering() {
        let a = Procedure::new("p", vec![ProcedureParam::new("x", DataType::Int32)], "");
        let b = Procedure::new(
            "p",
            vec![ProcedureParam::new("x", DataType::Int32).direction(ParamDirection::Out)],
            "",
        );
        assert_eq!(a.signature(), "p(IN x INT)");
        assert_eq!(compare_overloads(&a, &b), Ordering::Less);

        let v = Procedure::new("p", vec![ProcedureParam::new("x", DataType::Int32).variadic()], "");
        assert_eq!(compare_overloads(&v, &b), Ordering::Greater);
    }
}
