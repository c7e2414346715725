//! A folder of bank statements with a totals file alongside them

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use crate::{
    errors::Error,
    io::{load_totals_from_csv, read_statement, write_totals_to_csv},
    types::{BeneficiarySelector, Name, Roster, TotalsTable, PERSON_OWED},
};

/// Extension of statement and totals files
const CSV_EXTENSION: &str = "csv";

/// What a statement's file name ends with, after its owner
const STATEMENT_SUFFIX: &str = "_statement";

/// A statement file and the person who paid everything on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Where the statement is
    pub path: PathBuf,
    /// Whose statement it is
    pub owner: Name,
}

/// The statements to be reconciled, and the totals file they are reconciled into.
#[derive(Debug, Clone)]
pub struct StatementFolder {
    dir: PathBuf,
    totals_file: PathBuf,
}

impl StatementFolder {
    /// Points at `dir`, keeping totals in `totals_name` (`.csv` is added if missing).
    pub fn new(dir: impl Into<PathBuf>, totals_name: &str) -> Self {
        let dir = dir.into();
        let mut totals_file = dir.join(totals_name);
        if !has_csv_extension(&totals_file) {
            totals_file.set_extension(CSV_EXTENSION);
        }
        Self { dir, totals_file }
    }

    /// The folder holding the statements
    #[must_use]
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the totals are kept
    #[must_use]
    #[inline]
    pub fn totals_file(&self) -> &Path {
        &self.totals_file
    }

    /// Every statement in the folder, with its owner, sorted by path.
    ///
    /// Only CSV files named after their owner count as statements (see
    /// [`owner_from_file_name`]); anything else, the totals file included, is left alone.
    pub fn statements(&self, roster: &Roster) -> Result<Vec<Statement>, Error> {
        let mut statements = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || !has_csv_extension(&path) || path == self.totals_file {
                continue;
            }
            match owner_from_file_name(&path, roster) {
                Some(owner) => statements.push(Statement { path, owner }),
                None => tracing::debug!("{} is not a statement, ignoring it", path.display()),
            }
        }
        statements.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(statements)
    }

    /// Creates the totals file with just a `person_owed` header, unless it exists already.
    ///
    /// Returns whether the file was created.
    pub fn ensure_totals_file(&self) -> Result<bool, Error> {
        if self.totals_file.exists() {
            return Ok(false);
        }
        write_totals_to_csv(
            File::create(&self.totals_file)?,
            &Roster::default(),
            &TotalsTable::new(),
        )?;
        tracing::info!(
            "Created {} with header {PERSON_OWED}",
            self.totals_file.display()
        );
        Ok(true)
    }

    /// Reads the totals file; a missing file is an empty table.
    pub fn load_totals(&self, roster: &Roster) -> Result<TotalsTable, Error> {
        if !self.totals_file.exists() {
            return Ok(TotalsTable::new());
        }
        let file = BufReader::new(File::open(&self.totals_file)?);
        load_totals_from_csv(file, roster)
    }

    /// Replaces the totals file with `table`.
    pub fn save_totals(&self, roster: &Roster, table: &TotalsTable) -> Result<(), Error> {
        write_totals_to_csv(File::create(&self.totals_file)?, roster, table)?;
        tracing::info!(
            "Wrote {} creditor row(s) to {}",
            table.len(),
            self.totals_file.display()
        );
        Ok(())
    }

    /// Reads one statement, merges it into the totals and writes them back.
    ///
    /// The totals file is only written once the statement has been read and merged
    /// successfully, so a failure leaves it as it was.
    pub fn process_statement<S>(
        &self,
        statement: &Path,
        owner: &Name,
        roster: &Roster,
        selector: &mut S,
    ) -> Result<TotalsTable, Error>
    where
        S: BeneficiarySelector + ?Sized,
    {
        let statement_id = file_name(statement);
        let mut totals = self.load_totals(roster)?;
        let reader = BufReader::new(File::open(statement)?);
        let (owed, debtors) = read_statement(&statement_id, owner, reader, roster, selector)?;
        totals.merge(roster, &debtors, owner, &owed)?;
        self.save_totals(roster, &totals)?;
        tracing::info!(
            "Merged {statement_id}: {} person(s) owe {owner}",
            debtors.len()
        );
        Ok(totals)
    }
}

/// Works out whose statement a file is from its name.
///
/// Statements are called `<owner>_statement.csv`, where the owner may carry a possessive
/// `s` and is matched against the roster ignoring case: `jans_statement.csv` and
/// `Jan_statement.csv` both belong to Jan. Anything else, such as
/// `jans_coop_bank_statement.csv`, belongs to nobody.
#[must_use]
pub fn owner_from_file_name(statement: &Path, roster: &Roster) -> Option<Name> {
    let stem = statement.file_stem()?.to_str()?.to_lowercase();
    let word = stem.strip_suffix(STATEMENT_SUFFIX)?;
    if word.is_empty() || word.contains('_') {
        return None;
    }
    roster
        .names()
        .iter()
        .find(|name| {
            let name = name.as_str().to_lowercase();
            word == name || word.strip_suffix('s') == Some(name.as_str())
        })
        .cloned()
}

/// The file name, for messages and logs.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case(CSV_EXTENSION))
}
