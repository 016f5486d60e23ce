use super::error::{Error, ErrorKind, Result};
use num::complex::Complex64;
use num::rational::Ratio;
use num::traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int,
    Float,
    Rational,
    Complex,
    Hex,
    Binary,
    Symbolic,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Kind::Int => "Int",
            Kind::Float => "Float",
            Kind::Rational => "Rational",
            Kind::Complex => "Complex",
            Kind::Hex => "Hex",
            Kind::Binary => "Binary",
            Kind::Symbolic => "Symbolic",
        };
        f.write_str(name)
    }
}

/// A fraction kept in lowest terms with a positive denominator.
pub type Rational = Ratio<i64>;

pub type Complex = Complex64;

/// Rational arithmetic runs on `i128` so that reduction cannot overflow; only
/// results that fit back into `i64` are accepted.
fn exact(
    lhs: Rational,
    rhs: Rational,
    op: SymOp,
    apply: impl FnOnce(&Ratio<i128>, &Ratio<i128>) -> Option<Ratio<i128>>,
) -> Result<Rational> {
    let widen = |r: Rational| Ratio::new_raw(*r.numer() as i128, *r.denom() as i128);
    apply(&widen(lhs), &widen(rhs))
        .and_then(narrow)
        .ok_or_else(|| {
            Error::from(ErrorKind::Overflow(format!(
                "{} {} {}",
                lhs,
                op.symbol(),
                rhs
            )))
        })
}

fn narrow(r: Ratio<i128>) -> Option<Rational> {
    let numer = i64::try_from(*r.numer()).ok()?;
    let denom = i64::try_from(*r.denom()).ok()?;
    Some(Ratio::new_raw(numer, denom))
}

fn ratio(numer: i64, denom: i64) -> Result<Rational> {
    if denom == 0 {
        return Err(ErrorKind::DivisionByZero.into());
    }
    narrow(Ratio::new(numer as i128, denom as i128))
        .ok_or_else(|| Error::from(ErrorKind::Overflow(format!("{}/{}", numer, denom))))
}

fn complex_display(c: &Complex, f: &mut fmt::Formatter) -> fmt::Result {
    if c.im < 0.0 {
        write!(f, "{:?}-{:?}i", c.re, -c.im)
    } else {
        write!(f, "{:?}+{:?}i", c.re, c.im)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl SymOp {
    fn symbol(self) -> &'static str {
        match self {
            SymOp::Add => "+",
            SymOp::Sub => "-",
            SymOp::Mul => "*",
            SymOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymExpr {
    Atom(String),
    Const(NumericValue),
    Binary(SymOp, Symbolic, Symbolic),
}

/// Shared, immutable expression tree. No simplification is ever applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbolic(Arc<SymExpr>);

impl Symbolic {
    pub fn atom(name: impl Into<String>) -> Symbolic {
        Symbolic(Arc::new(SymExpr::Atom(name.into())))
    }

    pub fn expr(&self) -> &SymExpr {
        &self.0
    }

    fn lift(value: &NumericValue) -> Symbolic {
        match value {
            NumericValue::Symbolic(s) => s.clone(),
            other => Symbolic(Arc::new(SymExpr::Const(other.clone()))),
        }
    }

    fn binary(op: SymOp, lhs: &NumericValue, rhs: &NumericValue) -> NumericValue {
        NumericValue::Symbolic(Symbolic(Arc::new(SymExpr::Binary(
            op,
            Symbolic::lift(lhs),
            Symbolic::lift(rhs),
        ))))
    }
}

impl fmt::Display for Symbolic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expr() {
            SymExpr::Atom(name) => write!(f, "'{}", name),
            SymExpr::Const(value) => write!(f, "{}", value),
            SymExpr::Binary(op, lhs, rhs) => {
                for (i, side) in [lhs, rhs].iter().enumerate() {
                    if i == 1 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    match side.expr() {
                        SymExpr::Binary(..) => write!(f, "({})", side)?,
                        _ => write!(f, "{}", side)?,
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumericValue {
    Int(i64),
    Float(f64),
    Rational(Rational),
    Complex(Complex),
    Hex(i64),
    Binary(i64),
    Symbolic(Symbolic),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Radix {
    Decimal,
    Hex,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Level {
    Integer,
    Float,
    Rational,
    Complex,
    Symbolic,
}

impl Level {
    fn join(self, other: Level) -> Level {
        use Level::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Symbolic, _) | (_, Symbolic) => Symbolic,
            (Complex, _) | (_, Complex) => Complex,
            (Integer, x) | (x, Integer) => x,
            // Float and Rational only meet at Complex.
            _ => Complex,
        }
    }
}

enum Pair {
    Integers(i64, i64, Radix),
    Floats(f64, f64),
    Rationals(Rational, Rational),
    Complexes(Complex, Complex),
    Symbolic,
}

impl NumericValue {
    pub fn rational(num: i64, den: i64) -> Result<NumericValue> {
        ratio(num, den).map(NumericValue::Rational)
    }

    pub fn complex(re: f64, im: f64) -> NumericValue {
        NumericValue::Complex(Complex::new(re, im))
    }

    pub fn symbol(name: impl Into<String>) -> NumericValue {
        NumericValue::Symbolic(Symbolic::atom(name))
    }

    pub fn kind(&self) -> Kind {
        match self {
            NumericValue::Int(_) => Kind::Int,
            NumericValue::Float(_) => Kind::Float,
            NumericValue::Rational(_) => Kind::Rational,
            NumericValue::Complex(_) => Kind::Complex,
            NumericValue::Hex(_) => Kind::Hex,
            NumericValue::Binary(_) => Kind::Binary,
            NumericValue::Symbolic(_) => Kind::Symbolic,
        }
    }

    /// The integer payload of `Int`, `Hex` and `Binary` values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumericValue::Int(n) | NumericValue::Hex(n) | NumericValue::Binary(n) => Some(*n),
            _ => None,
        }
    }

    fn level(&self) -> Level {
        match self {
            NumericValue::Int(_) | NumericValue::Hex(_) | NumericValue::Binary(_) => {
                Level::Integer
            }
            NumericValue::Float(_) => Level::Float,
            NumericValue::Rational(_) => Level::Rational,
            NumericValue::Complex(_) => Level::Complex,
            NumericValue::Symbolic(_) => Level::Symbolic,
        }
    }

    fn radix(&self) -> Radix {
        match self {
            NumericValue::Hex(_) => Radix::Hex,
            NumericValue::Binary(_) => Radix::Binary,
            _ => Radix::Decimal,
        }
    }

    fn integer(n: i64, radix: Radix) -> NumericValue {
        match radix {
            Radix::Decimal => NumericValue::Int(n),
            Radix::Hex => NumericValue::Hex(n),
            Radix::Binary => NumericValue::Binary(n),
        }
    }

    fn to_f64(&self) -> f64 {
        match self {
            NumericValue::Float(x) => *x,
            NumericValue::Rational(r) => *r.numer() as f64 / *r.denom() as f64,
            other => other.as_i64().map(|n| n as f64).unwrap_or(f64::NAN),
        }
    }

    fn to_rational(&self) -> Rational {
        match self {
            NumericValue::Rational(r) => *r,
            other => Rational::from_integer(other.as_i64().unwrap_or(0)),
        }
    }

    fn to_complex(&self) -> Complex {
        match self {
            NumericValue::Complex(c) => *c,
            other => Complex::new(other.to_f64(), 0.0),
        }
    }

    fn promote(&self, rhs: &NumericValue) -> Pair {
        match self.level().join(rhs.level()) {
            Level::Integer => Pair::Integers(
                self.as_i64().unwrap_or(0),
                rhs.as_i64().unwrap_or(0),
                self.radix(),
            ),
            Level::Float => Pair::Floats(self.to_f64(), rhs.to_f64()),
            Level::Rational => Pair::Rationals(self.to_rational(), rhs.to_rational()),
            Level::Complex => Pair::Complexes(self.to_complex(), rhs.to_complex()),
            Level::Symbolic => Pair::Symbolic,
        }
    }

    fn checked(
        &self,
        rhs: &NumericValue,
        op: SymOp,
        result: Option<i64>,
        radix: Radix,
    ) -> Result<NumericValue> {
        result.map(|n| NumericValue::integer(n, radix)).ok_or_else(|| {
            Error::from(ErrorKind::Overflow(format!(
                "{} {} {}",
                self,
                op.symbol(),
                rhs
            )))
        })
    }

    pub fn add(&self, rhs: &NumericValue) -> Result<NumericValue> {
        match self.promote(rhs) {
            Pair::Integers(a, b, radix) => self.checked(rhs, SymOp::Add, a.checked_add(b), radix),
            Pair::Floats(a, b) => Ok(NumericValue::Float(a + b)),
            Pair::Rationals(a, b) => exact(a, b, SymOp::Add, |x, y| x.checked_add(y))
                .map(NumericValue::Rational),
            Pair::Complexes(a, b) => Ok(NumericValue::Complex(a + b)),
            Pair::Symbolic => Ok(Symbolic::binary(SymOp::Add, self, rhs)),
        }
    }

    pub fn sub(&self, rhs: &NumericValue) -> Result<NumericValue> {
        match self.promote(rhs) {
            Pair::Integers(a, b, radix) => self.checked(rhs, SymOp::Sub, a.checked_sub(b), radix),
            Pair::Floats(a, b) => Ok(NumericValue::Float(a - b)),
            Pair::Rationals(a, b) => exact(a, b, SymOp::Sub, |x, y| x.checked_sub(y))
                .map(NumericValue::Rational),
            Pair::Complexes(a, b) => Ok(NumericValue::Complex(a - b)),
            Pair::Symbolic => Ok(Symbolic::binary(SymOp::Sub, self, rhs)),
        }
    }

    pub fn mul(&self, rhs: &NumericValue) -> Result<NumericValue> {
        match self.promote(rhs) {
            Pair::Integers(a, b, radix) => self.checked(rhs, SymOp::Mul, a.checked_mul(b), radix),
            Pair::Floats(a, b) => Ok(NumericValue::Float(a * b)),
            Pair::Rationals(a, b) => exact(a, b, SymOp::Mul, |x, y| x.checked_mul(y))
                .map(NumericValue::Rational),
            Pair::Complexes(a, b) => Ok(NumericValue::Complex(a * b)),
            Pair::Symbolic => Ok(Symbolic::binary(SymOp::Mul, self, rhs)),
        }
    }

    /// Exact division: integers that do not divide evenly produce a `Rational`.
    pub fn div(&self, rhs: &NumericValue) -> Result<NumericValue> {
        match self.promote(rhs) {
            Pair::Integers(_, 0, _) => Err(ErrorKind::DivisionByZero.into()),
            Pair::Integers(a, b, radix) if a.checked_rem(b) == Some(0) => {
                self.checked(rhs, SymOp::Div, a.checked_div(b), radix)
            }
            Pair::Integers(a, b, _) => NumericValue::rational(a, b),
            Pair::Floats(_, b) if b == 0.0 => Err(ErrorKind::DivisionByZero.into()),
            Pair::Floats(a, b) => Ok(NumericValue::Float(a / b)),
            Pair::Rationals(_, b) if b.is_zero() => Err(ErrorKind::DivisionByZero.into()),
            Pair::Rationals(a, b) => exact(a, b, SymOp::Div, |x, y| x.checked_div(y))
                .map(NumericValue::Rational),
            Pair::Complexes(_, b) if b.is_zero() => Err(ErrorKind::DivisionByZero.into()),
            Pair::Complexes(a, b) => Ok(NumericValue::Complex(a / b)),
            Pair::Symbolic => Ok(Symbolic::binary(SymOp::Div, self, rhs)),
        }
    }

    fn incomparable(&self, rhs: &NumericValue) -> Error {
        Error::from(ErrorKind::Incomparable(format!(
            "{} ({}) and {} ({})",
            self,
            self.kind(),
            rhs,
            rhs.kind()
        )))
    }

    pub fn equals(&self, rhs: &NumericValue) -> Result<bool> {
        match self.promote(rhs) {
            Pair::Integers(a, b, _) => Ok(a == b),
            Pair::Floats(a, b) => Ok(a == b),
            Pair::Rationals(a, b) => Ok(a == b),
            Pair::Complexes(a, b) => Ok(a == b),
            Pair::Symbolic if self == rhs => Ok(true),
            Pair::Symbolic => Err(self.incomparable(rhs)),
        }
    }

    pub fn compare(&self, rhs: &NumericValue) -> Result<Ordering> {
        let ordering = match self.promote(rhs) {
            Pair::Integers(a, b, _) => Some(a.cmp(&b)),
            Pair::Floats(a, b) => a.partial_cmp(&b),
            Pair::Rationals(a, b) => Some(a.cmp(&b)),
            Pair::Complexes(a, b) if a.im == 0.0 && b.im == 0.0 => a.re.partial_cmp(&b.re),
            Pair::Complexes(..) => None,
            Pair::Symbolic if self == rhs => Some(Ordering::Equal),
            Pair::Symbolic => None,
        };
        ordering.ok_or_else(|| self.incomparable(rhs))
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NumericValue::Int(n) => write!(f, "{}", n),
            NumericValue::Float(x) => write!(f, "{:?}", x),
            NumericValue::Rational(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            NumericValue::Complex(c) => complex_display(c, f),
            NumericValue::Hex(n) if *n < 0 => write!(f, "-0x{:x}", n.unsigned_abs()),
            NumericValue::Hex(n) => write!(f, "0x{:x}", n),
            NumericValue::Binary(n) if *n < 0 => write!(f, "-0b{:b}", n.unsigned_abs()),
            NumericValue::Binary(n) => write!(f, "0b{:b}", n),
            NumericValue::Symbolic(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod test {
    use super::NumericValue::*;
    use super::*;

    fn ratio(n: i64, d: i64) -> NumericValue {
        NumericValue::rational(n, d).unwrap()
    }

    #[test]
    fn test_rational_exact() {
        assert_eq!(ratio(1, 2).add(&ratio(1, 3)).unwrap(), ratio(5, 6));
        assert_eq!(ratio(2, -4), ratio(-1, 2));
        assert_eq!(ratio(3, 4).sub(&ratio(3, 4)).unwrap(), ratio(0, 1));
        assert_eq!(ratio(6, 4).to_string(), "3/2");
        assert_eq!(ratio(4, 2).to_string(), "2/1");
        assert_eq!(ratio(-1, 3).mul(&ratio(3, -4)).unwrap(), ratio(1, 4));
        assert_eq!(ratio(1, 2).div(&ratio(-1, 4)).unwrap(), ratio(-2, 1));
    }

    #[test]
    fn test_rational_overflow() {
        let e = NumericValue::rational(i64::MIN, -1).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Overflow(_)));
        let e = ratio(i64::MAX, 1).add(&ratio(1, 2)).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Overflow(_)));
        let e = ratio(1, i64::MAX).mul(&ratio(1, 3)).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Overflow(_)));
        assert_eq!(
            ratio(i64::MAX, 2).sub(&ratio(i64::MAX, 2)).unwrap(),
            ratio(0, 1)
        );
    }

    #[test]
    fn test_int_overflow() {
        let e = Int(i64::MAX).add(&Int(1)).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Overflow(_)));
        let e = Int(i64::MIN).sub(&Int(1)).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Overflow(_)));
        assert_eq!(Int(2).add(&Int(3)).unwrap(), Int(5));
    }

    #[test]
    fn test_promotion() {
        assert_eq!(Int(1).add(&Float(0.5)).unwrap(), Float(1.5));
        assert_eq!(Int(1).add(&ratio(1, 2)).unwrap(), ratio(3, 2));
        assert_eq!(
            Float(0.5).add(&ratio(1, 2)).unwrap(),
            NumericValue::complex(1.0, 0.0)
        );
        assert_eq!(
            Int(1).add(&NumericValue::complex(2.0, 3.0)).unwrap(),
            NumericValue::complex(3.0, 3.0)
        );
        assert_eq!(Hex(0x10).add(&Int(1)).unwrap(), Hex(0x11));
        assert_eq!(Int(1).add(&Binary(2)).unwrap(), Int(3));
    }

    #[test]
    fn test_symbolic_absorbs() {
        let x = NumericValue::symbol("x");
        let sum = x.add(&Int(1)).unwrap();
        assert_eq!(sum.kind(), Kind::Symbolic);
        assert_eq!(sum.to_string(), "'x + 1");

        let twice = x.add(&x).unwrap();
        assert_eq!(twice.to_string(), "'x + 'x");
        assert_eq!(
            Int(2).mul(&sum).unwrap().to_string(),
            "2 * ('x + 1)"
        );
    }

    #[test]
    fn test_division() {
        assert_eq!(Int(6).div(&Int(3)).unwrap(), Int(2));
        assert_eq!(Int(1).div(&Int(3)).unwrap(), ratio(1, 3));
        for zero in &[Int(0), Float(0.0), ratio(0, 1), NumericValue::complex(0.0, 0.0)] {
            let e = Int(1).div(zero).unwrap_err();
            assert_eq!(e.kind(), &ErrorKind::DivisionByZero);
        }
        assert!(matches!(
            Int(i64::MIN).div(&Int(-1)).unwrap_err().kind(),
            ErrorKind::Overflow(_)
        ));
    }

    #[test]
    fn test_compare() {
        assert_eq!(Int(2).compare(&Float(2.5)).unwrap(), Ordering::Less);
        assert_eq!(ratio(1, 3).compare(&ratio(1, 4)).unwrap(), Ordering::Greater);
        assert!(Hex(255).equals(&Int(255)).unwrap());
        assert!(NumericValue::complex(1.0, 2.0)
            .equals(&NumericValue::complex(1.0, 2.0))
            .unwrap());

        let e = NumericValue::complex(1.0, 2.0).compare(&Int(1)).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Incomparable(_)));

        let x = NumericValue::symbol("x");
        assert!(x.equals(&x.clone()).unwrap());
        let e = x.equals(&NumericValue::symbol("y")).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Incomparable(_)));
        let e = x.compare(&Int(0)).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Incomparable(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Float(2.0).to_string(), "2.0");
        assert_eq!(Hex(31).to_string(), "0x1f");
        assert_eq!(Binary(5).to_string(), "0b101");
        assert_eq!(NumericValue::complex(3.0, -4.0).to_string(), "3.0-4.0i");
    }
}
