use crate::application::observer::HandshakeOutcome;
use crate::domain::commitments::HostedChannelRecord;
use crate::error::Result;
use std::io::Write;

/// Writes handshake results as CSV records.
///
/// `established,<channel_id>,<local_msat>,<remote_msat>` or
/// `failed,<reason>` per attempt, and
/// `channel,<channel_id>,<remote_node_id>,<state>` per stored channel.
/// Failure reasons may carry text chosen by the remote peer, so fields are
/// quoted whenever they contain a delimiter or a line break.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(writer: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);
        Self { writer }
    }

    pub fn write_outcome(&mut self, outcome: &HandshakeOutcome) -> Result<()> {
        match outcome {
            HandshakeOutcome::Established { commitments, .. } => {
                self.writer.write_record(&[
                    "established".to_string(),
                    commitments.channel_id.to_string(),
                    commitments.local_balance_msat.to_string(),
                    commitments.remote_balance_msat.to_string(),
                ])?;
            }
            HandshakeOutcome::Failed(error) => {
                self.writer
                    .write_record(&["failed".to_string(), error.to_string()])?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_channels(&mut self, records: &[HostedChannelRecord]) -> Result<()> {
        for record in records {
            self.writer.write_record(&[
                "channel".to_string(),
                record.channel_id.to_string(),
                record.peer.remote_node_id.to_string(),
                record.state.as_str().to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
