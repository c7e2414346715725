use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use crate::{
    errors::Error,
    types::{Name, OwedRecord, Roster, TotalsRow, TotalsTable, DECIMAL_SCALE},
};

/// Shares `amount` evenly between `beneficiaries`.
///
/// Each share is rounded to [`DECIMAL_SCALE`] places. No attempt is made to hand out the
/// leftover: 100 split three ways gives 33.33 each, and the remaining cent is lost.
/// # Errors
/// [`Error::InvalidSplit`] if there is nobody to share between
pub fn split(
    amount: Decimal,
    beneficiaries: &BTreeSet<Name>,
) -> Result<BTreeMap<Name, Decimal>, Error> {
    if beneficiaries.is_empty() {
        return Err(Error::InvalidSplit { amount });
    }
    let mut share = amount / Decimal::from(beneficiaries.len());
    share.rescale(DECIMAL_SCALE);
    Ok(beneficiaries
        .iter()
        .map(|name| (name.clone(), share))
        .collect())
}

/// `current + amount`, or [`Error::Overflow`] naming `debtor` if that doesn't fit.
fn checked_total(debtor: &Name, current: Decimal, amount: Decimal) -> Result<Decimal, Error> {
    current
        .checked_add(amount)
        .ok_or_else(|| Error::Overflow {
            debtor: debtor.clone(),
        })
}

impl OwedRecord {
    /// Splits one transaction between `beneficiaries` and adds everybody's share except the
    /// owner's to the record.
    ///
    /// Returns the debtors that were charged. On error the record is left as it was.
    pub(crate) fn add_split(
        &mut self,
        amount: Decimal,
        beneficiaries: &BTreeSet<Name>,
    ) -> Result<Vec<Name>, Error> {
        let shares = split(amount.abs(), beneficiaries)?;
        let mut totals = Vec::with_capacity(shares.len());
        for (debtor, share) in shares {
            // The owner paid; they don't owe themself
            if debtor == self.person_owed {
                continue;
            }
            let total = checked_total(&debtor, self.amount_owed_by(debtor.as_str()), share)?;
            totals.push((debtor, total));
        }
        let charged = totals.iter().map(|(debtor, _)| debtor.clone()).collect();
        self.owed.extend(totals);
        Ok(charged)
    }
}

impl TotalsRow {
    /// What `debtor` would owe after adding `amount`, without changing the row.
    fn total_with(&self, debtor: &Name, mut amount: Decimal) -> Result<Decimal, Error> {
        amount.rescale(DECIMAL_SCALE);
        checked_total(debtor, self.amount_owed_by(debtor.as_str()), amount)
    }

    /// Adds `amount` to what `debtor` owes this row's creditor.
    /// # Errors
    /// [`Error::Overflow`] if the sum doesn't fit; the row is unchanged then.
    pub(crate) fn add(&mut self, debtor: &Name, amount: Decimal) -> Result<(), Error> {
        let total = self.total_with(debtor, amount)?;
        self.owed.insert(debtor.clone(), total);
        Ok(())
    }
}

impl TotalsTable {
    /// Folds what one statement says is owed to `owner` into the running totals.
    ///
    /// If `owner` already has a row, each debtor in `debtor_names` has their amount from
    /// `owed` added to it (missing columns count as zero). Otherwise a new row is appended.
    /// Merging is additive: merging the same record twice doubles the amounts, but never
    /// produces a second row for the same creditor.
    ///
    /// Returns the header the table should be written with.
    /// # Errors
    /// [`Error::UnknownName`] if `owner` or any debtor is not in the roster, and
    /// [`Error::Overflow`] if a total gets too large. The table is left untouched in
    /// either case.
    pub fn merge(
        &mut self,
        roster: &Roster,
        debtor_names: &BTreeSet<Name>,
        owner: &Name,
        owed: &OwedRecord,
    ) -> Result<Vec<String>, Error> {
        roster.check(owner)?;
        for debtor in debtor_names {
            roster.check(debtor)?;
        }

        let index = self.rows.iter().position(|row| &row.person_owed == owner);
        let empty = TotalsRow::new(owner.clone());
        let current = index.map_or(&empty, |index| &self.rows[index]);
        let totals = debtor_names
            .iter()
            .filter(|debtor| *debtor != owner)
            .map(|debtor| -> Result<(Name, Decimal), Error> {
                let total = current.total_with(debtor, owed.amount_owed_by(debtor.as_str()))?;
                Ok((debtor.clone(), total))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let row = match index {
            Some(index) => &mut self.rows[index],
            None => {
                tracing::debug!("Adding a totals row for {owner}");
                self.rows.push(empty);
                let last = self.rows.len() - 1;
                &mut self.rows[last]
            }
        };
        row.owed.extend(totals);
        Ok(roster.header())
    }

    /// Adds a row read from storage, folding it into an existing row for the same creditor.
    /// # Errors
    /// [`Error::Overflow`] if the combined amounts don't fit; the table is unchanged then.
    pub(crate) fn absorb(&mut self, incoming: TotalsRow) -> Result<(), Error> {
        match self
            .rows
            .iter_mut()
            .find(|row| row.person_owed == incoming.person_owed)
        {
            Some(row) => {
                tracing::warn!(
                    "Totals hold more than one row for {}, combining them",
                    incoming.person_owed
                );
                let totals = incoming
                    .owed
                    .iter()
                    .map(|(debtor, amount)| -> Result<(Name, Decimal), Error> {
                        Ok((debtor.clone(), row.total_with(debtor, *amount)?))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                row.owed.extend(totals);
            }
            None => self.rows.push(incoming),
        }
        Ok(())
    }
}
