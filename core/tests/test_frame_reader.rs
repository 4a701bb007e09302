// Frame reader: exact reads across chunk boundaries, varints, truncation,
// transport failures and cancellation.

mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use bytes::Bytes;
    use chlite_core::framing::{FrameError, FrameReader};
    use chlite_core::stream::CancellationToken;
    use chlite_core::types::TransportError;
    use futures::executor::block_on;
    use futures::future;

    fn reader(chunks: Vec<Bytes>) -> FrameReader<chlite_core::transport::ChunkStream> {
        FrameReader::new(source(chunks), 16)
    }

    #[test]
    fn read_exact_spans_chunks() {
        let mut r = reader(split_every(b"abcdefgh", 3));
        block_on(async {
            assert_eq!(&r.read_exact(5).await.unwrap()[..], b"abcde");
            assert_eq!(&r.read_exact(3).await.unwrap()[..], b"fgh");
        });
        assert_eq!(r.position(), 8);
        assert_eq!(r.buffered_len(), 0);
        assert_eq!(r.chunks_received(), 3);
        assert_eq!(r.bytes_received(), 8);
    }

    #[test]
    fn single_bytes_cross_chunk_edges() {
        let mut r = reader(split_every(&[0x01, 0xFF, 0x7F], 1));
        block_on(async {
            assert_eq!(r.read_u8().await.unwrap(), 0x01);
            assert_eq!(r.read_u8().await.unwrap(), 0xFF);
            assert_eq!(r.read_u8().await.unwrap(), 0x7F);
            assert_eq!(r.read_u8().await.unwrap_err(), FrameError::Truncated { offset: 3, needed: 1, available: 0 });
        });
        assert_eq!(r.position(), 3);
    }

    #[test]
    fn only_the_unconsumed_tail_is_kept() {
        let mut r = reader(vec![Bytes::from_static(b"0123456789")]);
        block_on(async {
            r.read_exact(7).await.unwrap();
        });
        assert_eq!(r.buffered_len(), 3);
    }

    #[test]
    fn zero_length_read_needs_no_data() {
        let mut r = reader(vec![]);
        let out = block_on(r.read_exact(0)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let chunks = vec![Bytes::new(), Bytes::from_static(b"x"), Bytes::new(), Bytes::from_static(b"y")];
        let mut r = reader(chunks);
        assert_eq!(&block_on(r.read_exact(2)).unwrap()[..], b"xy");
        assert_eq!(r.chunks_received(), 2);
    }

    #[test]
    fn truncation_reports_offset_and_shortfall() {
        let mut r = reader(split_every(b"abcd", 1));
        let err = block_on(async {
            r.read_exact(1).await.unwrap();
            r.read_exact(10).await.unwrap_err()
        });
        assert_eq!(err, FrameError::Truncated { offset: 1, needed: 10, available: 3 });
    }

    #[test]
    fn varints_decode_across_one_byte_chunks() {
        let mut body = varint(300);
        body.extend(varint(u64::MAX));
        body.extend(varint(0));
        let mut r = reader(split_every(&body, 1));

        block_on(async {
            assert_eq!(r.peek_varint().await.unwrap(), Some(300));
            assert_eq!(r.read_varint().await.unwrap(), 300);
            assert_eq!(r.read_varint().await.unwrap(), u64::MAX);
            assert_eq!(r.read_varint().await.unwrap(), 0);
            assert_eq!(r.peek_varint().await.unwrap(), None);
        });
        assert_eq!(r.position(), 2 + 10 + 1);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = reader(vec![Bytes::from(varint(5))]);
        block_on(async {
            assert_eq!(r.peek_varint().await.unwrap(), Some(5));
            assert_eq!(r.peek_varint().await.unwrap(), Some(5));
        });
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn partial_varint_at_end_is_truncation() {
        let mut r = reader(vec![Bytes::from_static(&[0x80, 0x80])]);
        let err = block_on(r.peek_varint()).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { offset: 0, available: 2, .. }));
    }

    #[test]
    fn overlong_varint_is_rejected() {
        let mut r = reader(vec![Bytes::from(vec![0xFF; 11])]);
        let err = block_on(r.read_varint()).unwrap_err();
        assert_eq!(err, FrameError::VarintOverflow { offset: 0 });
    }

    #[test]
    fn transport_failure_is_surfaced() {
        let mut r = FrameReader::new(failing_source(vec![Bytes::from_static(b"ab")], "reset by peer"), 16);
        let err = block_on(r.read_exact(4)).unwrap_err();
        assert_eq!(err, FrameError::Transport(TransportError::new("reset by peer")));
    }

    #[test]
    fn cancellation_interrupts_a_pending_read() {
        let token = CancellationToken::new();
        let mut r = FrameReader::new(stalled_source(vec![Bytes::from_static(b"a")]), 16)
            .with_cancellation(token.clone());

        let (result, ()) = block_on(future::join(r.read_exact(4), async { token.cancel() }));
        assert_eq!(result.unwrap_err(), FrameError::Cancelled);
    }

    #[test]
    fn release_drops_source_and_buffer() {
        let mut r = reader(vec![Bytes::from_static(b"abcdef")]);
        block_on(r.read_exact(2)).unwrap();
        r.release();

        assert_eq!(r.buffered_len(), 0);
        assert!(matches!(block_on(r.read_exact(1)), Err(FrameError::Truncated { .. })));
    }
}
