//! Helpers for reading statements and the totals file, and writing totals back out

use std::{
    collections::BTreeSet,
    io::{BufRead, Read, Write},
};

use csv::{StringRecord, Trim};
use rust_decimal::Decimal;

use crate::{
    errors::Error,
    types::{
        BeneficiarySelector, Name, OwedRecord, Roster, Selection, TotalsRow, TotalsTable,
        Transaction, DECIMAL_SCALE, PERSON_OWED,
    },
};

/// Reads one bank statement and works out what everybody owes its owner.
///
/// `selector` is asked who benefited from each transaction. A transaction can be shared
/// between several people, and may include `owner`, whose own share is left out. Skipped
/// transactions don't count towards anything.
///
/// Returns the [`OwedRecord`] for `owner`, and every name charged at least once.
///
/// Expects input data with a header, and at least an amount column:
/// ```csv
/// Date,       Description,    Amount
/// 2024-01-02, Groceries,       30.00
/// 2024-01-05, Electricity,     30.00
/// ```
/// # Errors
/// - [`Error::UnknownName`] if `owner` is not in the roster
/// - [`Error::MalformedStatement`] if the statement has no amount column or a row doesn't parse
/// - [`Error::Transaction`] wrapping whatever went wrong with a particular transaction:
///   an unknown beneficiary, nobody to split with, the selector failing, a total
///   overflowing, or a shared amount whose sign differs from the shared amounts before it
///
/// Column names are matched regardless of case. Amounts are split by magnitude, so it
/// doesn't matter whether the bank records spending as positive or negative, but it must
/// do so consistently: refunds and credits have to be skipped, not shared.
///
/// Nothing is returned for a statement that fails part-way, so a bad statement can never
/// make it into the totals.
pub fn read_statement<R, S>(
    statement: &str,
    owner: &Name,
    reader: R,
    roster: &Roster,
    selector: &mut S,
) -> Result<(OwedRecord, BTreeSet<Name>), Error>
where
    R: Read,
    S: BeneficiarySelector + ?Sized,
{
    roster.check(owner)?;
    let malformed = |line: u64, reason: String| Error::MalformedStatement {
        statement: statement.to_owned(),
        line,
        reason,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    // Banks disagree on capitalisation, so columns are matched in lowercase
    let headers: StringRecord = csv_reader
        .headers()
        .map_err(|err| malformed(1, err.to_string()))?
        .iter()
        .map(str::to_lowercase)
        .collect();
    if !headers.iter().any(|column| column == "amount") {
        return Err(malformed(1, "no amount column".to_owned()));
    }

    let mut owed = OwedRecord::new(owner.clone());
    let mut debtors = BTreeSet::new();
    // Whether shared spending is negative on this statement, once there has been some
    let mut spending_negative: Option<bool> = None;
    let mut record = StringRecord::new();
    let mut line = 1;
    loop {
        match csv_reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                let line = err.position().map_or(line + 1, |position| position.line());
                return Err(malformed(line, err.to_string()));
            }
        }
        line = record.position().map_or(line + 1, |position| position.line());
        let transaction: Transaction = record
            .deserialize(Some(&headers))
            .map_err(|err| malformed(line, err.to_string()))?;

        let selection = selector
            .select(statement, &transaction)
            .map_err(|err| err.in_transaction(statement, line))?;
        let beneficiaries = match selection {
            Selection::Skip => {
                tracing::debug!("{statement}:{line}: skipping {transaction:?}");
                continue;
            }
            Selection::Split(beneficiaries) => beneficiaries,
        };
        for name in &beneficiaries {
            roster
                .check(name)
                .map_err(|err| err.in_transaction(statement, line))?;
        }
        if !transaction.amount.is_zero() {
            let negative = transaction.amount.is_sign_negative();
            if spending_negative.is_some_and(|expected| expected != negative) {
                return Err(Error::MixedSigns {
                    amount: transaction.amount,
                }
                .in_transaction(statement, line));
            }
            spending_negative = Some(negative);
        }
        let charged = owed
            .add_split(transaction.amount, &beneficiaries)
            .map_err(|err| err.in_transaction(statement, line))?;
        tracing::debug!(
            "{statement}:{line}: {} shared between {beneficiaries:?}",
            transaction.amount
        );
        debtors.extend(charged);
    }
    Ok((owed, debtors))
}

/// Loads the running totals from a CSV-formatted stream.
///
/// Expects input data in this format (including header); empty cells count as zero, and
/// zero amounts are not kept as entries:
/// ```csv
/// person_owed,  Jan, Sophie
/// Sophie,     100.0,    0.0
/// Jan,             ,   10.0
/// ```
/// A file with only a header, or nothing at all, is an empty table.
/// # Errors
/// - [`Error::MalformedTotals`] if the first column isn't `person_owed`, a column repeats,
///   a creditor is blank or an amount doesn't parse
/// - [`Error::UnknownName`] if a column or creditor is not in the roster
/// - [`Error::Overflow`] if duplicate rows for a creditor add up to too much
pub fn load_totals_from_csv<R: Read>(reader: R, roster: &Roster) -> Result<TotalsTable, Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut table = TotalsTable::new();
    if headers.is_empty() {
        return Ok(table);
    }
    if headers.get(0) != Some(PERSON_OWED) {
        return Err(Error::MalformedTotals(format!(
            "first column should be {PERSON_OWED}, found {:?}",
            headers.get(0).unwrap_or_default()
        )));
    }

    let mut columns: Vec<Name> = Vec::with_capacity(headers.len() - 1);
    for column in headers.iter().skip(1) {
        let name = Name::from(column);
        roster.check(&name)?;
        if columns.contains(&name) {
            return Err(Error::MalformedTotals(format!("column {name} appears twice")));
        }
        columns.push(name);
    }

    for record in csv_reader.records() {
        let record = record?;
        let person_owed = Name::from(record.get(0).unwrap_or_default());
        if person_owed.as_str().is_empty() {
            return Err(Error::MalformedTotals(format!(
                "row {} has no {PERSON_OWED}",
                table.len() + 1
            )));
        }
        roster.check(&person_owed)?;
        let mut row = TotalsRow::new(person_owed);
        for (debtor, cell) in columns.iter().zip(record.iter().skip(1)) {
            if cell.is_empty() {
                continue;
            }
            let amount: Decimal = cell.parse().map_err(|_| {
                Error::MalformedTotals(format!(
                    "{cell:?} is not an amount (owed by {debtor} to {})",
                    row.person_owed()
                ))
            })?;
            if !amount.is_zero() {
                row.add(debtor, amount)?;
            }
        }
        table.absorb(row)?;
    }
    Ok(table)
}

/// Writes the whole totals table out as CSV.
///
/// The header is `person_owed` followed by every roster name, in roster order, and each
/// creditor gets one row. Anybody without an entry is written as owing `0.00`.
///
/// Output data will be in the form:
/// ```csv
/// person_owed,Jan,Sophie
/// Sophie,190.00,0.00
/// Jan,0.00,10.00
/// ```
/// # Errors
/// [`Error::UnknownName`] if the table names anybody outside the roster; nothing is
/// written in that case.
pub fn write_totals_to_csv<W: Write>(
    writer: W,
    roster: &Roster,
    table: &TotalsTable,
) -> Result<(), Error> {
    for row in table {
        roster.check(row.person_owed())?;
        for debtor in row.debtors() {
            roster.check(debtor)?;
        }
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(roster.header())?;
    for row in table {
        let amounts = roster.names().iter().map(|name| {
            let mut amount = row.amount_owed_by(name.as_str());
            amount.rescale(DECIMAL_SCALE);
            amount.to_string()
        });
        let record: Vec<String> = std::iter::once(row.person_owed().to_string())
            .chain(amounts)
            .collect();
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Asks somebody at a terminal who each transaction was for.
///
/// Each transaction is shown on `output`, and one line is read from `input`: names separated
/// by spaces, or a blank line (or `skip`) to leave the transaction out.
#[derive(Debug)]
pub struct PromptSelector<R, W> {
    input: R,
    output: W,
    roster: Roster,
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    /// Creates a selector that reads answers from `input` and writes questions to `output`
    pub fn new(input: R, output: W, roster: Roster) -> Self {
        Self {
            input,
            output,
            roster,
        }
    }
}

impl<R: BufRead, W: Write> BeneficiarySelector for PromptSelector<R, W> {
    fn select(&mut self, statement: &str, transaction: &Transaction) -> Result<Selection, Error> {
        writeln!(
            self.output,
            "[{statement}] {} {} {}",
            transaction.date.as_deref().unwrap_or("-"),
            transaction.label().unwrap_or(""),
            transaction.amount
        )?;
        write!(
            self.output,
            "Who was this for? ({}; blank to skip) ",
            self.roster
                .names()
                .iter()
                .map(Name::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        )?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(Error::NoSelection);
        }
        Ok(Selection::parse(&answer, &self.roster))
    }
}
