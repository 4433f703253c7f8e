use std::collections::BTreeMap;

/// A single record header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered multimap of record headers, duplicates allowed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    /// Create an empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing entries with the same key
    pub fn add<K: Into<String>, V: Into<Vec<u8>>>(&mut self, key: K, value: V) -> &mut Self {
        self.entries.push(Header::new(key, value));
        self
    }

    /// Builder form of [`Headers::add`]
    pub fn with<K: Into<String>, V: Into<Vec<u8>>>(mut self, key: K, value: V) -> Self {
        self.add(key, value);
        self
    }

    /// First value stored under `key`
    pub fn first(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_slice())
    }

    /// Last value stored under `key`
    pub fn last(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .rev()
            .find(|h| h.key == key)
            .map(|h| h.value.as_slice())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|h| h.key == key)
    }

    /// Remove every entry stored under `key`
    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.entries.retain(|h| h.key != key);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Outbound record as handed to the producer pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerRecord<K, V> {
    pub topic: String,
    pub partition: Option<i32>,
    /// Milliseconds since the epoch; assigned at send time when absent
    pub timestamp: Option<i64>,
    pub key: Option<K>,
    pub value: Option<V>,
    pub headers: Headers,
}

impl<K, V> ProducerRecord<K, V> {
    pub fn new<T: Into<String>>(topic: T, value: Option<V>) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            timestamp: None,
            key: None,
            value,
            headers: Headers::new(),
        }
    }

    pub fn with_key(mut self, key: K) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header<HK: Into<String>, HV: Into<Vec<u8>>>(mut self, key: HK, value: HV) -> Self {
        self.headers.add(key, value);
        self
    }

    /// New record with the same topic, partition, timestamp and key but a
    /// different value and header set
    pub fn replace_value(self, value: Option<V>, headers: Headers) -> Self {
        Self {
            topic: self.topic,
            partition: self.partition,
            timestamp: self.timestamp,
            key: self.key,
            value,
            headers,
        }
    }
}

/// Record as stored by the broker: encoded bytes plus broker-assigned position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Headers,
}

/// Topic and partition pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new<T: Into<String>>(topic: T, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

/// Inbound record after decoding
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerRecord<K, V> {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: i64,
    pub key: Option<K>,
    pub value: Option<V>,
    pub headers: Headers,
}

impl<K, V> ConsumerRecord<K, V> {
    /// New record with every field preserved except the value
    pub fn replace_value(self, value: Option<V>) -> Self {
        Self {
            topic: self.topic,
            partition: self.partition,
            offset: self.offset,
            timestamp: self.timestamp,
            key: self.key,
            value,
            headers: self.headers,
        }
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

/// Batch of inbound records in poll order
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerRecords<K, V> {
    records: Vec<ConsumerRecord<K, V>>,
}

impl<K, V> ConsumerRecords<K, V> {
    pub fn new(records: Vec<ConsumerRecord<K, V>>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConsumerRecord<K, V>> {
        self.records.iter()
    }

    /// Records grouped by partition, poll order kept within each partition
    pub fn by_partition(&self) -> BTreeMap<TopicPartition, Vec<&ConsumerRecord<K, V>>> {
        let mut grouped: BTreeMap<TopicPartition, Vec<&ConsumerRecord<K, V>>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry(record.topic_partition())
                .or_default()
                .push(record);
        }
        grouped
    }

    pub fn into_vec(self) -> Vec<ConsumerRecord<K, V>> {
        self.records
    }
}

impl<K, V> IntoIterator for ConsumerRecords<K, V> {
    type Item = ConsumerRecord<K, V>;
    type IntoIter = std::vec::IntoIter<ConsumerRecord<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<K, V> FromIterator<ConsumerRecord<K, V>> for ConsumerRecords<K, V> {
    fn from_iter<I: IntoIterator<Item = ConsumerRecord<K, V>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
