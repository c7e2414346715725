//! Common datatypes supporting functions throughout Tallyup

use std::{
    borrow::Borrow,
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt::Display,
};

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::Error;

/// The number of decimals to track for all amounts (whole cents)
pub const DECIMAL_SCALE: u32 = 2;

/// Name of the first column of the totals file, holding the creditor of each row
pub const PERSON_OWED: &str = "person_owed";

/// A person taking part in the shared expenses
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(String);

impl Name {
    /// Creates a name, trimming surrounding whitespace
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self(name.trim().to_owned())
    }

    /// Returns the name as a string slice
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The ordered list of everybody who can owe or be owed.
///
/// Determines the columns of the totals file, in order. Names outside the roster
/// are rejected wherever they turn up instead of quietly growing a new column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    names: Vec<Name>,
}

impl Roster {
    /// Builds a roster, dropping blank names and repeats while keeping first-seen order
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        let mut roster = Self::default();
        for name in names {
            let name = name.into();
            if !name.as_str().is_empty() && !roster.contains(name.as_str()) {
                roster.names.push(name);
            }
        }
        roster
    }

    /// Builds a roster from whitespace-separated names, e.g. `"Jan Sophie"`
    #[must_use]
    pub fn parse(names: &str) -> Self {
        Self::new(names.split_whitespace())
    }

    /// All names, in column order
    #[must_use]
    #[inline]
    pub fn names(&self) -> &[Name] {
        &self.names
    }

    /// Returns whether the roster has no names at all
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Exact, case-sensitive membership test
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known.as_str() == name)
    }

    /// Finds the roster's spelling of a name, ignoring case
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Name> {
        self.names
            .iter()
            .find(|known| known.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Returns an [`Error::UnknownName`] if the name is not in the roster
    pub fn check(&self, name: &Name) -> Result<(), Error> {
        if self.contains(name.as_str()) {
            Ok(())
        } else {
            Err(Error::UnknownName(name.clone()))
        }
    }

    /// Header row of the totals file: [`PERSON_OWED`] followed by every name
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        std::iter::once(PERSON_OWED.to_owned())
            .chain(self.names.iter().map(|name| name.to_string()))
            .collect()
    }
}

/// A single row of a bank statement.
///
/// Only `amount` is required; other columns in the statement are ignored. Column names are
/// expected in lowercase, which [`read_statement`](crate::io::read_statement) takes care of.
/// ```csv
/// date,       description,       amount
/// 2024-01-03, Groceries,          30.00
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// When the transaction happened, in whatever format the bank uses
    #[serde(default)]
    pub date: Option<String>,
    /// Free text from the bank describing the transaction
    #[serde(default)]
    pub description: Option<String>,
    /// Extra note some banks export next to, or instead of, a description
    #[serde(default)]
    pub memo: Option<String>,
    /// The money spent. Some banks record spending as negative amounts.
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: Decimal,
}

impl Transaction {
    /// The description if there is one, otherwise the memo
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.description
            .as_deref()
            .filter(|text| !text.is_empty())
            .or(self.memo.as_deref())
    }
}

/// Function to help [`serde`] deserialize a statement amount into a [`Decimal`] with [`DECIMAL_SCALE`] scale.
///
/// Thousands separators are tolerated, so `"1,204.50"` reads as `1204.50`.
fn deserialize_amount<'de, D>(value: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(value)?;
    let mut amount: Decimal = raw
        .trim()
        .replace(',', "")
        .parse()
        .map_err(|err| {
            <D::Error as serde::de::Error>::custom(format!("invalid amount {raw:?}: {err}"))
        })?;
    amount.rescale(DECIMAL_SCALE);
    Ok(amount)
}

/// Who a transaction was for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Leave the transaction out of the totals entirely
    Skip,
    /// Share the transaction evenly between these people (possibly including the statement owner)
    Split(BTreeSet<Name>),
}

impl Selection {
    /// Shorthand for a [`Selection::Split`] between the given names
    pub fn split<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        Self::Split(names.into_iter().map(Into::into).collect())
    }

    /// Interprets a typed answer: blank or `skip` skips, anything else is a list of names.
    ///
    /// Names are matched to the roster's spelling ignoring case. Names the roster does not
    /// know are kept as typed, so that the statement reader can report them.
    #[must_use]
    pub fn parse(answer: &str, roster: &Roster) -> Self {
        let answer = answer.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("skip") {
            return Self::Skip;
        }
        Self::Split(
            answer
                .split_whitespace()
                .map(|typed| roster.resolve(typed).cloned().unwrap_or_else(|| typed.into()))
                .collect(),
        )
    }
}

/// Supplies the beneficiaries of each transaction while a statement is being read.
///
/// The statement reader never asks anybody anything itself; it is handed one of these.
pub trait BeneficiarySelector {
    /// Decides who benefited from `transaction`, which was read from `statement`
    fn select(&mut self, statement: &str, transaction: &Transaction) -> Result<Selection, Error>;
}

/// Gives the same answer for every transaction
#[derive(Debug, Clone)]
pub struct FixedSelection(pub Selection);

impl BeneficiarySelector for FixedSelection {
    fn select(&mut self, _statement: &str, _transaction: &Transaction) -> Result<Selection, Error> {
        Ok(self.0.clone())
    }
}

/// Hands out prepared answers in order, one per transaction.
///
/// Returns [`Error::NoSelection`] once the answers run out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSelections {
    answers: VecDeque<Selection>,
}

impl ScriptedSelections {
    /// Creates a script from answers in transaction order
    pub fn new(answers: impl IntoIterator<Item = Selection>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }
}

impl BeneficiarySelector for ScriptedSelections {
    fn select(&mut self, _statement: &str, _transaction: &Transaction) -> Result<Selection, Error> {
        self.answers.pop_front().ok_or(Error::NoSelection)
    }
}

/// What everybody owes the owner of one statement.
///
/// The owner is never a debtor in their own record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwedRecord {
    /// The statement owner, who paid
    pub(crate) person_owed: Name,
    /// Debtor to amount owed
    pub(crate) owed: BTreeMap<Name, Decimal>,
}

impl OwedRecord {
    /// Creates a record in which nobody owes `person_owed` anything yet
    #[must_use]
    pub fn new(person_owed: Name) -> Self {
        Self {
            person_owed,
            owed: BTreeMap::new(),
        }
    }

    /// The creditor of this record
    #[must_use]
    #[inline]
    pub fn person_owed(&self) -> &Name {
        &self.person_owed
    }

    /// The amount `debtor` owes, zero if they owe nothing
    #[must_use]
    pub fn amount_owed_by(&self, debtor: &str) -> Decimal {
        self.owed
            .get(debtor)
            .copied()
            .unwrap_or_else(|| Decimal::new(0, DECIMAL_SCALE))
    }

    /// Iterates over debtors and what they owe, ordered by name
    pub fn debts(&self) -> impl Iterator<Item = (&Name, Decimal)> {
        self.owed.iter().map(|(name, amount)| (name, *amount))
    }

    /// Returns whether nobody owes anything
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.owed.is_empty()
    }
}

/// One row of the totals file: what each person owes one creditor, across every statement so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsRow {
    /// The creditor
    pub(crate) person_owed: Name,
    /// Debtor to amount owed. Absent debtors owe nothing.
    pub(crate) owed: BTreeMap<Name, Decimal>,
}

impl TotalsRow {
    /// Creates a row in which nobody owes `person_owed` anything
    #[must_use]
    pub fn new(person_owed: Name) -> Self {
        Self {
            person_owed,
            owed: BTreeMap::new(),
        }
    }

    /// The creditor of this row
    #[must_use]
    #[inline]
    pub fn person_owed(&self) -> &Name {
        &self.person_owed
    }

    /// The amount `debtor` owes, zero if they have no entry
    #[must_use]
    pub fn amount_owed_by(&self, debtor: &str) -> Decimal {
        self.owed
            .get(debtor)
            .copied()
            .unwrap_or_else(|| Decimal::new(0, DECIMAL_SCALE))
    }

    /// Names with an entry in this row, ordered by name
    pub fn debtors(&self) -> impl Iterator<Item = &Name> {
        self.owed.keys()
    }
}

/// The running ledger of who owes whom, one row per creditor.
///
/// Only [`TotalsTable::merge`] and the totals loader add to it, and both keep creditors unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TotalsTable {
    /// Rows in file order
    pub(crate) rows: Vec<TotalsRow>,
}

impl TotalsTable {
    /// Creates a new, empty [`TotalsTable`]
    #[must_use]
    pub fn new() -> Self {
        TotalsTable::default()
    }

    /// All rows, in file order
    #[must_use]
    #[inline]
    pub fn rows(&self) -> &[TotalsRow] {
        &self.rows
    }

    /// The row for `person_owed`, if they are owed anything
    #[must_use]
    pub fn row(&self, person_owed: &str) -> Option<&TotalsRow> {
        self.rows
            .iter()
            .find(|row| row.person_owed.as_str() == person_owed)
    }

    /// Number of creditors in the table
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the table has no rows
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a> IntoIterator for &'a TotalsTable {
    type Item = &'a TotalsRow;
    type IntoIter = std::slice::Iter<'a, TotalsRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_parse_drops_repeats_and_keeps_order() {
        let roster = Roster::parse("  Sophie Jan\tSophie  James ");
        let names: Vec<&str> = roster.names().iter().map(Name::as_str).collect();
        assert_eq!(names, vec!["Sophie", "Jan", "James"]);
    }

    #[test]
    fn test_roster_header() {
        let roster = Roster::parse("Jan Sophie");
        assert_eq!(roster.header(), vec!["person_owed", "Jan", "Sophie"]);
        assert_eq!(Roster::default().header(), vec!["person_owed"]);
    }

    #[test]
    fn test_roster_check() {
        let roster = Roster::parse("Jan Sophie");
        assert!(roster.check(&Name::from("Jan")).is_ok());
        match roster.check(&Name::from("jan")) {
            Err(Error::UnknownName(name)) => assert_eq!(name.as_str(), "jan"),
            other => panic!("Unexpected result {other:?}"),
        }
        assert_eq!(roster.resolve("jan"), Some(&Name::from("Jan")));
    }

    #[test]
    fn test_selection_parse() {
        let roster = Roster::parse("Jan Sophie");
        assert_eq!(Selection::parse("", &roster), Selection::Skip);
        assert_eq!(Selection::parse("  SKIP \n", &roster), Selection::Skip);
        assert_eq!(
            Selection::parse("sophie Jan sophie", &roster),
            Selection::split(["Jan", "Sophie"])
        );
        assert_eq!(
            Selection::parse("Jan Sven", &roster),
            Selection::split(["Jan", "Sven"])
        );
    }

    #[test]
    fn test_scripted_selections_run_out() {
        let transaction = Transaction {
            date: None,
            description: None,
            memo: None,
            amount: Decimal::new(3000, DECIMAL_SCALE),
        };
        let mut script = ScriptedSelections::new([Selection::Skip]);
        assert_eq!(script.select("s.csv", &transaction).unwrap(), Selection::Skip);
        assert!(matches!(
            script.select("s.csv", &transaction),
            Err(Error::NoSelection)
        ));
    }

    #[test]
    fn test_missing_debtor_owes_nothing() {
        let row = TotalsRow::new("Jan".into());
        assert_eq!(row.amount_owed_by("Sophie"), Decimal::ZERO);
        assert_eq!(row.amount_owed_by("Sophie").to_string(), "0.00");
    }
}
