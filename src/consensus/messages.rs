//! Consensus snapshot message and its binary codec
//!
//! Wire format, little-endian throughout:
//!
//! ```text
//! string   := u32 length ++ raw bytes
//! double   := IEEE-754 binary64, 8 bytes
//! seq<T>   := u32 count ++ count * T
//! bid      := string agent_id ++ double score ++ double timestamp
//! map<K,V> := u32 count ++ count * (K ++ V)
//!
//! message  := string sender_id
//!          ++ double timestamp
//!          ++ seq<string> bundle
//!          ++ seq<string> path
//!          ++ map<string, bid> winning_bids
//!          ++ map<string, string> winners
//!          ++ map<string, double> timestamps
//! ```
//!
//! Map entries are emitted in iteration order; the protocol imposes no
//! ordering. Decoding rejects truncated buffers and trailing bytes.

use serde::{Deserialize, Serialize};

use crate::consensus::bid::{AgentTimestamps, Bid, TaskBids, TaskWinners};
use crate::error::Error;
use crate::types::{AgentId, NO_AGENT, TaskId, Timestamp};

/// Snapshot of an agent's consensus state, exchanged every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CBBAMessage {
    pub sender_id: AgentId,
    pub timestamp: Timestamp,
    pub bundle: Vec<TaskId>,
    pub path: Vec<TaskId>,
    pub winning_bids: TaskBids,
    pub winners: TaskWinners,
    pub timestamps: AgentTimestamps,
}

impl Default for CBBAMessage {
    fn default() -> Self {
        Self::new(NO_AGENT, 0.0)
    }
}

impl CBBAMessage {
    pub fn new(sender_id: impl Into<AgentId>, timestamp: Timestamp) -> Self {
        Self {
            sender_id: sender_id.into(),
            timestamp,
            bundle: Vec::new(),
            path: Vec::new(),
            winning_bids: TaskBids::new(),
            winners: TaskWinners::new(),
            timestamps: AgentTimestamps::new(),
        }
    }

    /// Winning bid the sender reported for a task; the invalid bid if the
    /// message does not mention it.
    pub fn winning_bid(&self, task_id: &str) -> Bid {
        self.winning_bids.get(task_id).cloned().unwrap_or_default()
    }

    /// Winner the sender reported for a task.
    pub fn winner(&self, task_id: &str) -> AgentId {
        self.winners
            .get(task_id)
            .cloned()
            .unwrap_or_else(|| NO_AGENT.to_string())
    }

    /// Serialize to the wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        w.write_string(&self.sender_id);
        w.write_double(self.timestamp);
        w.write_string_seq(&self.bundle);
        w.write_string_seq(&self.path);

        w.write_u32(self.winning_bids.len() as u32);
        for (task_id, bid) in &self.winning_bids {
            w.write_string(task_id);
            w.write_bid(bid);
        }

        w.write_u32(self.winners.len() as u32);
        for (task_id, agent_id) in &self.winners {
            w.write_string(task_id);
            w.write_string(agent_id);
        }

        w.write_u32(self.timestamps.len() as u32);
        for (agent_id, ts) in &self.timestamps {
            w.write_string(agent_id);
            w.write_double(*ts);
        }

        w.into_buffer()
    }

    /// Parse a message from the wire format. Fails on any truncation and on
    /// trailing bytes.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let mut r = BinaryReader::new(data);

        let sender_id = r.read_string()?;
        let timestamp = r.read_double()?;
        let bundle = r.read_string_seq()?;
        let path = r.read_string_seq()?;

        let mut winning_bids = TaskBids::new();
        for _ in 0..r.read_u32()? {
            let task_id = r.read_string()?;
            let bid = r.read_bid()?;
            winning_bids.insert(task_id, bid);
        }

        let mut winners = TaskWinners::new();
        for _ in 0..r.read_u32()? {
            let task_id = r.read_string()?;
            let agent_id = r.read_string()?;
            winners.insert(task_id, agent_id);
        }

        let mut timestamps = AgentTimestamps::new();
        for _ in 0..r.read_u32()? {
            let agent_id = r.read_string()?;
            let ts = r.read_double()?;
            timestamps.insert(agent_id, ts);
        }

        r.finish()?;

        Ok(Self {
            sender_id,
            timestamp,
            bundle,
            path,
            winning_bids,
            winners,
            timestamps,
        })
    }
}

struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn write_double(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn write_string(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.buffer.extend_from_slice(s.as_bytes());
    }

    fn write_string_seq(&mut self, seq: &[String]) {
        self.write_u32(seq.len() as u32);
        for s in seq {
            self.write_string(s);
        }
    }

    fn write_bid(&mut self, bid: &Bid) {
        self.write_string(&bid.agent_id);
        self.write_double(bid.score);
        self.write_double(bid.timestamp);
    }

    fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if n > self.data.len() - self.pos {
            return Err(Error::MalformedMessage);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_double(&mut self) -> Result<f64, Error> {
        let bytes = self.take(8)?;
        Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::MalformedMessage)
    }

    fn read_string_seq(&mut self) -> Result<Vec<String>, Error> {
        let count = self.read_u32()?;
        let mut seq = Vec::new();
        for _ in 0..count {
            seq.push(self.read_string()?);
        }
        Ok(seq)
    }

    fn read_bid(&mut self) -> Result<Bid, Error> {
        Ok(Bid {
            agent_id: self.read_string()?,
            score: self.read_double()?,
            timestamp: self.read_double()?,
        })
    }

    /// Trailing bytes mean the blob is not one of our messages.
    fn finish(&self) -> Result<(), Error> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(Error::MalformedMessage)
        }
    }
}
