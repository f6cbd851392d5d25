use crate::domain::account::Account;
use crate::error::Result;
use std::io::Write;

/// Writes final account states as CSV (`id,owner,balance,currency`).
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: Vec<Account>) -> Result<()> {
        self.writer
            .write_record(["id", "owner", "balance", "currency"])?;
        for account in accounts {
            self.writer.write_record([
                account.id.to_string(),
                account.owner,
                account.balance.0.normalize().to_string(),
                account.currency.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
