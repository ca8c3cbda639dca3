//! Object-created notifications in the S3 event document shape.
//!
//! Only the fields the pipeline consumes are modelled. Unknown fields are
//! ignored so full notification payloads deserialize as-is.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const OBJECT_CREATED_PUT: &str = "ObjectCreated:Put";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3EventRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Object {
    /// URL-encoded object key.
    pub key: String,
    pub size: u64,
}

/// The decoded fields of the first record of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectCreated {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("event carries no records")]
    NoRecords,
    #[error("object key `{0}` is not valid URL encoding")]
    MalformedKey(String),
}

impl S3Event {
    /// Build the notification the object store emits after a successful put.
    pub fn object_created(bucket: &str, key: &str, size: u64, region: &str) -> Self {
        Self {
            records: vec![S3EventRecord {
                event_name: Some(OBJECT_CREATED_PUT.to_string()),
                event_source: Some("aws:s3".to_string()),
                aws_region: Some(region.to_string()),
                event_time: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
                s3: S3Entity {
                    bucket: S3Bucket {
                        name: bucket.to_string(),
                    },
                    object: S3Object {
                        key: encode_key(key),
                        size,
                    },
                },
            }],
        }
    }

    /// Decode `Records[0]`. Later records are ignored.
    pub fn first_object_created(&self) -> Result<ObjectCreated, EventError> {
        let record = self.records.first().ok_or(EventError::NoRecords)?;
        Ok(ObjectCreated {
            bucket: record.s3.bucket.name.clone(),
            key: decode_key(&record.s3.object.key)?,
            size: record.s3.object.size,
        })
    }
}

/// Keys in notifications are form-encoded: `+` is a space, `%XX` escapes.
pub fn decode_key(raw: &str) -> Result<String, EventError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| EventError::MalformedKey(raw.to_string()))
}

pub fn encode_key(key: &str) -> String {
    urlencoding::encode(key).replace("%20", "+").replace("%2F", "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFICATION: &str = r#"{
        "Records": [{
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "awsRegion": "us-east-2",
            "eventTime": "2024-03-01T10:00:00.000Z",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "s3SchemaVersion": "1.0",
                "bucket": { "name": "photo-bucket", "arn": "arn:aws:s3:::photo-bucket" },
                "object": { "key": "holidays/beach+day%281%29.jpg", "size": 10000, "eTag": "abc" }
            }
        }]
    }"#;

    #[test]
    fn parses_a_full_notification() {
        let event: S3Event = serde_json::from_str(NOTIFICATION).unwrap();
        let created = event.first_object_created().unwrap();
        assert_eq!(created.bucket, "photo-bucket");
        assert_eq!(created.key, "holidays/beach day(1).jpg");
        assert_eq!(created.size, 10000);
        assert_eq!(
            event.records[0].event_name.as_deref(),
            Some(OBJECT_CREATED_PUT)
        );
    }

    #[test]
    fn empty_records_are_rejected() {
        let event: S3Event = serde_json::from_str(r#"{"Records": []}"#).unwrap();
        assert_eq!(event.first_object_created(), Err(EventError::NoRecords));
    }

    #[test]
    fn invalid_escape_is_rejected() {
        assert!(matches!(
            decode_key("bad%FFkey"),
            Err(EventError::MalformedKey(_))
        ));
    }

    #[test]
    fn emitted_events_decode_back_to_the_original_key() {
        let key = "albums/summer 2024/a+b_thumbnail.png";
        let event = S3Event::object_created("photo-bucket", key, 42, "us-east-2");
        assert_eq!(
            event.records[0].s3.object.key,
            "albums/summer+2024/a%2Bb_thumbnail.png"
        );
        let created = event.first_object_created().unwrap();
        assert_eq!(created.key, key);
        assert_eq!(created.size, 42);
    }
}
