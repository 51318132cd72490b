//! `arraysize` attribute grammar.
//!
//! Dimensions are separated by `x`. The last dimension may end in `*`,
//! meaning variable length; digits before the `*` are a size hint that is
//! parsed but not enforced. A bad hint is kept as an error alongside an
//! otherwise usable variable-length shape.

use std::fmt;

/// Parsed `arraysize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySize {
    dims: Vec<usize>,
    variable: bool,
    hint: Option<usize>,
    hint_error: Option<ArraySizeError>,
}

/// Why an `arraysize` could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArraySizeError {
    /// A dimension is not a number or `*`, or `*` is not last
    BadToken(String),
    /// A dimension is negative
    Negative(String),
    /// The fixed dimensions multiply to more elements than can be addressed
    Overflow(String),
}

impl fmt::Display for ArraySizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArraySizeError::BadToken(tok) => write!(f, "bad dimension \"{}\"", tok),
            ArraySizeError::Negative(tok) => write!(f, "negative dimension \"{}\"", tok),
            ArraySizeError::Overflow(text) => write!(f, "\"{}\" has too many elements", text),
        }
    }
}

impl ArraySize {
    /// Parses an `arraysize` value.
    pub fn parse(text: &str) -> Result<Self, ArraySizeError> {
        let tokens: Vec<&str> = text.trim().split('x').map(str::trim).collect();
        let last = tokens.len() - 1;
        let mut dims = Vec::with_capacity(tokens.len());
        let mut variable = false;
        let mut hint = None;
        let mut hint_error = None;
        let mut product: usize = 1;

        for (index, token) in tokens.iter().enumerate() {
            if let Some(size) = token.strip_suffix('*') {
                if index != last {
                    return Err(ArraySizeError::BadToken(token.to_string()));
                }
                variable = true;
                if !size.is_empty() {
                    match parse_dim(size, token) {
                        Ok(size) => hint = Some(size),
                        Err(err) => hint_error = Some(err),
                    }
                }
            } else {
                let dim = parse_dim(token, token)?;
                product = product
                    .checked_mul(dim)
                    .ok_or_else(|| ArraySizeError::Overflow(text.trim().to_string()))?;
                dims.push(dim);
            }
        }

        Ok(Self {
            dims,
            variable,
            hint,
            hint_error,
        })
    }

    /// Problem with the size hint before a trailing `*`, if it was unusable.
    pub fn hint_error(&self) -> Option<&ArraySizeError> {
        self.hint_error.as_ref()
    }

    /// Fixed dimensions, not including a trailing variable one.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// True if the last dimension is variable.
    pub fn is_variable(&self) -> bool {
        self.variable
    }

    /// Size hint given before a trailing `*`.
    pub fn hint(&self) -> Option<usize> {
        self.hint
    }

    /// Number of dimensions, counting a variable one.
    pub fn ndim(&self) -> usize {
        self.dims.len() + usize::from(self.variable)
    }

    /// Product of the fixed dimensions; `parse` guarantees it fits.
    pub fn fixed_product(&self) -> usize {
        self.dims.iter().fold(1, |acc, &dim| acc.saturating_mul(dim))
    }

    /// Total element count, or `None` if variable.
    pub fn count(&self) -> Option<usize> {
        if self.variable {
            None
        } else {
            Some(self.fixed_product())
        }
    }
}

fn parse_dim(digits: &str, token: &str) -> Result<usize, ArraySizeError> {
    if let Some(rest) = digits.strip_prefix('-') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ArraySizeError::Negative(token.to_string()));
        }
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ArraySizeError::BadToken(token.to_string()));
    }
    digits
        .parse()
        .map_err(|_| ArraySizeError::BadToken(token.to_string()))
}
