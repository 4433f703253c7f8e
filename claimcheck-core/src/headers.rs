//! Reserved header names and the payload-size side channel used in
//! streaming mode.

use crate::{ClaimCheckError, ClaimCheckResult, Headers};

/// Carries the UTF-8 reference of an externalized value
pub const HEADER_MESSAGE_CLAIM_CHECK: &str = "message-claim-check";

/// Carries the rendered failure of an attempted, failed externalization
pub const HEADER_MESSAGE_CLAIM_CHECK_ERROR: &str = "message-claim-check-error";

/// Carries the declared stream length as an 8-byte big-endian signed integer
pub const HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE: &str = "message-claim-check-payload-size";

/// Whether the record value was externalized
pub fn is_claim_check(headers: &Headers) -> bool {
    headers.contains(HEADER_MESSAGE_CLAIM_CHECK)
}

/// Whether externalization was attempted and failed
pub fn is_claim_check_error(headers: &Headers) -> bool {
    headers.contains(HEADER_MESSAGE_CLAIM_CHECK_ERROR)
}

/// Declare the payload length of a streamed value
pub fn set_payload_size(headers: &mut Headers, payload_size: u64) -> ClaimCheckResult<()> {
    let size = i64::try_from(payload_size).map_err(|_| {
        ClaimCheckError::contract(format!("payload size {payload_size} does not fit in a signed 64-bit integer"))
    })?;
    headers.add(HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE, size.to_be_bytes().to_vec());
    Ok(())
}

/// Read the declared payload length; the last header wins
pub fn payload_size(headers: &Headers) -> ClaimCheckResult<u64> {
    let raw = headers.last(HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE).ok_or_else(|| {
        ClaimCheckError::contract(format!(
            "You must supply the '{HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE}' header in streaming mode"
        ))
    })?;

    let bytes: [u8; 8] = raw.try_into().map_err(|_| {
        ClaimCheckError::contract(format!(
            "'{HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE}' header must be 8 bytes, got {}",
            raw.len()
        ))
    })?;

    let size = i64::from_be_bytes(bytes);
    u64::try_from(size).map_err(|_| {
        ClaimCheckError::contract(format!(
            "'{HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE}' header must not be negative, got {size}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_payload_size_is_big_endian() {
        let mut headers = Headers::new();
        set_payload_size(&mut headers, 258).unwrap();

        assert_eq!(
            headers.first(HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE),
            Some(&[0, 0, 0, 0, 0, 0, 1, 2][..])
        );
        assert_eq!(payload_size(&headers).unwrap(), 258);
    }

    #[test]
    fn test_last_payload_size_wins() {
        let mut headers = Headers::new();
        set_payload_size(&mut headers, 1).unwrap();
        set_payload_size(&mut headers, 2).unwrap();

        assert_eq!(payload_size(&headers).unwrap(), 2);
    }

    #[test]
    fn test_missing_payload_size_is_contract_violation() {
        let err = payload_size(&Headers::new()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ContractViolation);
        assert!(err.to_string().contains(HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE));
    }

    #[test]
    fn test_malformed_payload_size() {
        let short = Headers::new().with(HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE, vec![1, 2]);
        let negative = Headers::new().with(
            HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE,
            (-1i64).to_be_bytes().to_vec(),
        );

        assert_eq!(payload_size(&short).unwrap_err().kind(), ErrorKind::ContractViolation);
        assert_eq!(payload_size(&negative).unwrap_err().kind(), ErrorKind::ContractViolation);
    }
}
