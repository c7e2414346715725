use rust_decimal::Decimal;

use crate::types::Name;

/// Error type that can be returned by fallible operations in this crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error reading or writing a totals CSV file; could wrap IO or parsing errors
    #[error("Error processing totals CSV")]
    Load(#[from] csv::Error),
    /// Error touching the statement folder or the totals file on disk
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    /// An amount was to be shared between nobody.
    ///
    /// Aborts the enclosing statement rather than letting a total go silently wrong.
    #[error("Cannot split {amount} between zero beneficiaries")]
    InvalidSplit {
        /// The amount that could not be split
        amount: Decimal,
    },
    /// A running total grew past what a [`Decimal`] can hold
    #[error("The amount owed by {debtor} is too large to add up")]
    Overflow {
        /// Whose total overflowed
        debtor: Name,
    },
    /// A transaction to be shared goes the other way from the ones shared before it,
    /// e.g. a refund on a statement where spending is negative
    #[error("{amount} has the opposite sign to the spending before it; skip refunds and credits")]
    MixedSigns {
        /// The amount of the offending transaction
        amount: Decimal,
    },
    /// A statement row does not look like a transaction (missing or unparsable amount, broken CSV)
    #[error("Statement {statement} is malformed at line {line}: {reason}")]
    MalformedStatement {
        /// File name (or other identifier) of the statement
        statement: String,
        /// 1-based line in the statement file, header included
        line: u64,
        /// What was wrong with the line
        reason: String,
    },
    /// The totals file does not have the expected layout
    #[error("Totals file is malformed: {0}")]
    MalformedTotals(String),
    /// A name that is not part of the configured [`Roster`](crate::types::Roster)
    #[error("{0} is not in the list of known names")]
    UnknownName(Name),
    /// A [`BeneficiarySelector`](crate::types::BeneficiarySelector) had no answer to give
    #[error("No beneficiary selection available")]
    NoSelection,
    /// Wraps an error with the statement and transaction it was raised for
    #[error("In statement {statement}, transaction at line {line}")]
    Transaction {
        /// File name (or other identifier) of the statement
        statement: String,
        /// 1-based line in the statement file, header included
        line: u64,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attaches statement and line context to an error raised while handling a transaction.
    pub(crate) fn in_transaction(self, statement: &str, line: u64) -> Self {
        Error::Transaction {
            statement: statement.to_owned(),
            line,
            source: Box::new(self),
        }
    }
}
