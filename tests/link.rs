//! Drives complete links over recording mock lines.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

mod common;

use common::{
    Event, Response, WaitKind, clocks_per_latch, config, count, harness, latched_bytes,
};
use embassy_time::{Duration, with_timeout};
use pico_vectron::{
    AbortPolicy, Delivery, Frame, HandshakeState, IterSource, LineRole, LinkConfig, LinkError,
    QuantizedLevel, Recovery, RetryPolicy, SkipPolicy,
};

fn level(v: u8) -> QuantizedLevel {
    QuantizedLevel::new(v).unwrap()
}

#[tokio::test]
async fn samples_are_sent_as_quantized_msb_first_bytes() {
    let mut h = harness(&[], config(100), AbortPolicy);

    let stats = h
        .link
        .run(&mut IterSource::new([5, 15, 25, 255].into_iter()))
        .await
        .unwrap();

    assert_eq!(stats.sent, 4);
    let events = h.events();
    assert_eq!(latched_bytes(&events), [0, 1, 2, 5]);
    assert_eq!(count(&events, Event::Set(LineRole::Interrupt, false)), 4);
    assert_eq!(count(&events, Event::Ack), 4);
}

#[tokio::test]
async fn each_cycle_runs_shift_latch_interrupt_ack_in_order() {
    let mut h = harness(&[], config(100), AbortPolicy);
    h.link.send_level(level(5)).await.unwrap();

    let events = h.events();
    let tail: Vec<Event> = events
        .iter()
        .copied()
        .filter(|e| !matches!(e, Event::Set(LineRole::Data | LineRole::Clock, _)))
        .collect();
    assert_eq!(
        tail,
        [
            Event::Set(LineRole::Latch, true),
            Event::Set(LineRole::Latch, false),
            Event::Set(LineRole::Interrupt, false),
            Event::Set(LineRole::Interrupt, true),
            Event::AckWaitStart(WaitKind::Falling),
            Event::Ack,
        ]
    );
}

#[tokio::test]
async fn no_clock_until_previous_byte_acked() {
    let mut h = harness(&[], config(100), AbortPolicy);
    for raw in [0, 12, 33, 49, 50, 7] {
        h.link.send_sample(raw).await.unwrap();
    }

    let mut awaiting_ack = false;
    for event in h.events() {
        match event {
            Event::Set(LineRole::Latch, true) => awaiting_ack = true,
            Event::Ack => awaiting_ack = false,
            Event::Set(LineRole::Clock, true) => {
                assert!(!awaiting_ack, "clock pulse before previous byte acked");
            }
            _ => (),
        }
    }
    assert!(!awaiting_ack);
}

#[tokio::test]
async fn every_latch_follows_exactly_eight_clocks() {
    let mut h = harness(&[Response::Never, Response::Ack], config(10), RetryPolicy::default());
    for raw in [1, 99, 42] {
        h.link.send_sample(raw).await.unwrap();
    }

    let counts = clocks_per_latch(&h.events());
    // One retry, so 4 latches for 3 samples.
    assert_eq!(counts, [8, 8, 8, 8]);
    assert_eq!(h.link.shift_register().pulses(), 0);
}

#[tokio::test]
async fn write_after_a_failed_shift_latches_a_full_byte() {
    let mut h = harness(&[], config(100), AbortPolicy);
    h.break_line(LineRole::Clock);
    assert_eq!(
        h.link.send_level(level(5)).await,
        Err(LinkError::LineFault(LineRole::Clock))
    );
    assert_eq!(h.link.shift_register().pulses(), 0);

    h.heal_line(LineRole::Clock);
    h.link.reset().unwrap();
    h.link.send_level(level(3)).await.unwrap();

    let events = h.events();
    assert_eq!(clocks_per_latch(&events), [8]);
    assert_eq!(latched_bytes(&events), [3]);
}

#[tokio::test]
async fn ack_is_awaited_as_a_falling_edge() {
    let mut h = harness(&[], config(100), AbortPolicy);
    for raw in [0, 25, 60] {
        h.link.send_sample(raw).await.unwrap();
    }

    let waits: Vec<Event> = h
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::AckWaitStart(_)))
        .collect();
    assert_eq!(waits, [Event::AckWaitStart(WaitKind::Falling); 3]);
}

#[tokio::test]
async fn interrupt_is_inactive_while_awaiting_ack() {
    let mut h = harness(&[], config(100), AbortPolicy);
    for raw in [10, 20, 30] {
        h.link.send_sample(raw).await.unwrap();
    }

    let mut interrupt_high = true;
    for event in h.events() {
        match event {
            Event::Set(LineRole::Interrupt, high) => interrupt_high = high,
            Event::AckWaitStart(_) => assert!(interrupt_high),
            _ => (),
        }
    }
}

#[tokio::test]
async fn missing_ack_times_out_as_unresponsive() {
    let mut h = harness(&[Response::Never], config(20), AbortPolicy);

    let start = std::time::Instant::now();
    let result = h.link.send_level(level(3)).await;
    let elapsed = start.elapsed();

    assert_eq!(result, Err(LinkError::PeripheralUnresponsive));
    assert!(elapsed >= std::time::Duration::from_millis(20));
    assert!(elapsed < std::time::Duration::from_millis(500), "took {elapsed:?}");

    assert_eq!(h.link.handshake().state(), HandshakeState::Idle);
    assert_eq!(
        h.events().last(),
        Some(&Event::AckWaitStart(WaitKind::Falling)),
        "nothing driven after the wait started"
    );
}

#[tokio::test]
async fn retry_policy_resends_the_same_byte() {
    let mut h = harness(
        &[Response::Never, Response::Ack],
        config(10),
        RetryPolicy::new(3, Recovery::Abort),
    );

    let delivery = h.link.send_level(level(4)).await.unwrap();

    assert_eq!(delivery, Delivery::Delivered { attempts: 2 });
    assert_eq!(latched_bytes(&h.events()), [4, 4]);
    let stats = h.link.stats();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.retries, 1);
}

#[tokio::test]
async fn retry_policy_falls_back_when_exhausted() {
    let mut h = harness(
        &[Response::Never, Response::Never, Response::Never],
        config(5),
        RetryPolicy::new(1, Recovery::Abort),
    );

    let result = h.link.send_level(level(1)).await;

    assert_eq!(result, Err(LinkError::PeripheralUnresponsive));
    assert_eq!(latched_bytes(&h.events()), [1, 1]);
    assert_eq!(h.link.stats().retries, 1);
}

#[tokio::test]
async fn skip_policy_drops_byte_and_carries_on() {
    let mut h = harness(&[Response::Never], config(10), SkipPolicy);

    assert_eq!(h.link.send_sample(25).await, Ok(Delivery::Skipped));
    assert_eq!(
        h.link.send_sample(35).await,
        Ok(Delivery::Delivered { attempts: 1 })
    );

    assert_eq!(latched_bytes(&h.events()), [2, 3]);
    let stats = h.link.stats();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.sent, 1);
}

#[tokio::test]
async fn closure_policy_sees_level_and_attempt() {
    let mut seen = Vec::new();
    let mut h = harness(
        &[Response::Never, Response::Never],
        config(5),
        |level: QuantizedLevel, attempt: u32| {
            seen.push((level.value(), attempt));
            if attempt < 2 { Recovery::Retry } else { Recovery::Skip }
        },
    );

    assert_eq!(h.link.send_level(level(2)).await, Ok(Delivery::Skipped));
    drop(h);
    assert_eq!(seen, [(2, 1), (2, 2)]);
}

#[tokio::test]
async fn run_skips_out_of_range_samples() {
    let mut h = harness(&[], config(100), AbortPolicy);

    let stats = h
        .link
        .run(&mut IterSource::new([3, -1, 300, 45].into_iter()))
        .await
        .unwrap();

    assert_eq!(stats.sent, 2);
    assert_eq!(stats.rejected, 2);
    assert_eq!(latched_bytes(&h.events()), [0, 4]);
}

#[tokio::test]
async fn out_of_range_sample_touches_no_lines() {
    let mut h = harness(&[], config(100), AbortPolicy);

    assert_eq!(h.link.send_sample(256).await, Err(LinkError::OutOfRange(256)));
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn line_fault_aborts_the_cycle() {
    let mut h = harness(&[], config(100), RetryPolicy::default());
    h.break_line(LineRole::Clock);

    let result = h.link.send_level(level(5)).await;

    assert_eq!(result, Err(LinkError::LineFault(LineRole::Clock)));
    assert!(result.unwrap_err().is_fatal());
    let events = h.events();
    assert_eq!(count(&events, Event::Set(LineRole::Latch, true)), 0);
    assert_eq!(count(&events, Event::Set(LineRole::Interrupt, false)), 0);
}

#[tokio::test]
async fn run_propagates_line_faults() {
    let mut h = harness(&[], config(100), SkipPolicy);
    h.break_line(LineRole::Interrupt);

    let result = h
        .link
        .run(&mut IterSource::new([1, 2, 3].into_iter()))
        .await;

    assert_eq!(result, Err(LinkError::LineFault(LineRole::Interrupt)));
    assert_eq!(latched_bytes(&h.events()), [0]);
    assert_eq!(h.link.stats().sent, 0);
}

#[tokio::test]
async fn cancelled_ack_wait_leaves_interrupt_inactive() {
    let mut h = harness(&[Response::Never], LinkConfig::unbounded(), AbortPolicy);

    // With no ack timeout the wait never finishes on its own.
    let cancelled = with_timeout(Duration::from_millis(10), h.link.send_level(level(1))).await;
    assert!(cancelled.is_err());
    assert_eq!(h.link.handshake().state(), HandshakeState::AwaitingAck);
    assert_eq!(
        h.events()
            .iter()
            .rev()
            .find(|e| matches!(e, Event::Set(LineRole::Interrupt, _))),
        Some(&Event::Set(LineRole::Interrupt, true))
    );

    h.link.reset().unwrap();
    assert_eq!(h.link.handshake().state(), HandshakeState::Idle);

    // And the link carries on from there.
    assert_eq!(
        h.link.send_level(level(2)).await,
        Ok(Delivery::Delivered { attempts: 1 })
    );
}

#[tokio::test]
async fn notify_recovers_from_a_cancelled_wait_by_itself() {
    let mut h = harness(&[Response::Never], LinkConfig::unbounded(), AbortPolicy);

    let cancelled = with_timeout(Duration::from_millis(10), h.link.send_level(level(1))).await;
    assert!(cancelled.is_err());

    h.link.send_level(level(3)).await.unwrap();
    assert_eq!(h.link.handshake().state(), HandshakeState::Idle);
    assert_eq!(latched_bytes(&h.events()), [1, 3]);
}

#[tokio::test]
async fn send_frame_counts_only_delivered_samples() {
    let mut h = harness(&[Response::Ack, Response::Never], config(10), SkipPolicy);
    // Only the first channel of each RGB pixel is kept.
    let frame = Frame::from_interleaved(&[5, 0, 0, 15, 0, 0, 25, 0, 0, 255, 0, 0]);
    assert_eq!(frame.len(), 4);

    let delivered = h.link.send_frame(&frame).await.unwrap();

    assert_eq!(delivered, 3);
    assert_eq!(latched_bytes(&h.events()), [0, 1, 2, 5]);
    let stats = h.link.stats();
    assert_eq!(stats.sent, 3);
    assert_eq!(stats.skipped, 1);
}
