mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{advert_from, router, v4, wait_for_state, Harness, VRID};
use vrrp_failover::{
    packet::{Advertisement, IpVersion, PseudoHeader, VrrpPacket},
    queue::PacketQueue,
    States, Transition,
};

const WITHIN: Duration = Duration::from_secs(5);

fn counter() -> (Arc<AtomicUsize>, Box<dyn FnMut() + Send>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    (
        count,
        Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn owner_becomes_master_and_resigns_on_stop() {
    let harness = Harness::new();
    let mut vrouter = router(true, 255, 5);
    let (init_to_master, hook) = counter();
    vrouter.enroll(Transition::Init2Master, hook);

    let handle = vrouter.start(harness.link.clone());
    assert!(wait_for_state(&handle, States::Master, WITHIN).await);
    assert_eq!(init_to_master.load(Ordering::SeqCst), 1);
    assert_eq!(harness.announcements(), 1);

    let first = harness.sent()[0].clone();
    assert_eq!(first.priority, 255);
    assert_eq!(first.vrid, VRID);
    assert_eq!(first.adver_int, 5);
    assert_eq!(first.ip_addresses, vec![v4(100)]);

    let vrouter = handle.stop().await.unwrap();
    assert_eq!(vrouter.state(), States::Init);
    assert_eq!(vrouter.priority(), 255);
    assert!(harness.closed.load(Ordering::SeqCst));

    let sent = harness.sent();
    assert_eq!(sent.last().unwrap().priority, 0);
    assert_eq!(sent.iter().filter(|pkt| pkt.priority == 0).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn master_keeps_advertising() {
    let harness = Harness::new();
    let handle = router(true, 255, 5).start(harness.link.clone());
    assert!(wait_for_state(&handle, States::Master, WITHIN).await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let vrouter = handle.stop().await.unwrap();

    let periodic = harness.sent().iter().filter(|pkt| pkt.priority == 255).count();
    assert!(periodic >= 3, "only {periodic} advertisements sent");
    assert_eq!(harness.announcements(), 1);
    assert_eq!(vrouter.state(), States::Init);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backup_takes_over_when_master_is_silent() {
    let harness = Harness::new();
    let handle = router(false, 100, 5).start(harness.link.clone());
    assert!(wait_for_state(&handle, States::Backup, WITHIN).await);

    let (backup_to_master, hook) = counter();
    handle.enroll(Transition::Backup2Master, hook).await.unwrap();

    assert!(wait_for_state(&handle, States::Master, WITHIN).await);
    assert_eq!(backup_to_master.load(Ordering::SeqCst), 1);
    assert_eq!(harness.sent()[0].priority, 100);
    assert_eq!(harness.announcements(), 1);

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backup_holds_while_master_advertises() {
    let harness = Harness::new();
    let handle = router(false, 100, 5).start(harness.link.clone());
    assert!(wait_for_state(&handle, States::Backup, WITHIN).await);

    // Master_Down_Interval for a 5cs master is 19cs
    for _ in 0..12 {
        harness
            .inject
            .send(advert_from(v4(20), VRID, 200, 5))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(handle.state(), States::Backup);
    assert!(harness.sent().is_empty());

    // silence from the master lets the backup take over
    assert!(wait_for_state(&handle, States::Master, WITHIN).await);
    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn other_groups_are_filtered() {
    let harness = Harness::new();
    let handle = router(false, 100, 5).start(harness.link.clone());
    assert!(wait_for_state(&handle, States::Backup, WITHIN).await);

    for _ in 0..4 {
        harness
            .inject
            .send(advert_from(v4(20), VRID + 1, 200, 5))
            .unwrap();
    }
    assert!(wait_for_state(&handle, States::Master, WITHIN).await);
    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn master_steps_down_to_higher_priority() {
    let harness = Harness::new();
    let mut vrouter = router(false, 100, 5);
    let (master_to_backup, hook) = counter();
    vrouter.enroll(Transition::Master2Backup, hook);

    let handle = vrouter.start(harness.link.clone());
    assert!(wait_for_state(&handle, States::Master, WITHIN).await);

    // a one second challenger keeps us in Backup for 3.61s
    harness
        .inject
        .send(advert_from(v4(20), VRID, 150, 100))
        .unwrap();
    assert!(wait_for_state(&handle, States::Backup, WITHIN).await);
    assert_eq!(master_to_backup.load(Ordering::SeqCst), 1);

    let before_stop = harness.sent().len();
    let vrouter = handle.stop().await.unwrap();
    assert_eq!(vrouter.state(), States::Init);
    assert_eq!(vrouter.master_adver_interval(), 100);
    // a Backup leaves without resigning
    assert_eq!(harness.sent().len(), before_stop);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn enroll_replaces_running_hook() {
    let harness = Harness::new();
    let handle = router(false, 100, 5).start(harness.link.clone());

    let (first, hook) = counter();
    handle.enroll(Transition::Backup2Master, hook).await.unwrap();
    let (second, hook) = counter();
    handle.enroll(Transition::Backup2Master, hook).await.unwrap();

    assert!(wait_for_state(&handle, States::Master, WITHIN).await);
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_hook_still_stops_cleanly() {
    let harness = Harness::new();
    let mut vrouter = router(true, 255, 5);
    vrouter.enroll(Transition::Init2Master, Box::new(|| panic!("hook failure")));
    let (master_to_init, hook) = counter();
    vrouter.enroll(Transition::Master2Init, hook);

    let handle = vrouter.start(harness.link.clone());
    assert!(wait_for_state(&handle, States::Master, WITHIN).await);

    let vrouter = handle.stop().await.unwrap();
    assert_eq!(vrouter.state(), States::Init);
    assert_eq!(master_to_init.load(Ordering::SeqCst), 1);
    assert!(harness.closed.load(Ordering::SeqCst));

    // the receiver is gone once stop() returns
    let receives = harness.receives();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.receives(), receives);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_the_handle_resigns_and_closes() {
    let harness = Harness::new();
    let handle = router(true, 255, 5).start(harness.link.clone());
    assert!(wait_for_state(&handle, States::Master, WITHIN).await);

    drop(handle);
    assert!(harness.wait_closed(WITHIN).await);
    assert_eq!(harness.sent().last().unwrap().priority, 0);

    let receives = harness.receives();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.receives(), receives);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_queue_never_blocks_the_receiver() {
    let queue = Arc::new(PacketQueue::new(1000));
    let producer = queue.clone();

    let pushed = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::task::spawn_blocking(move || {
            for n in 0..5000u32 {
                let packet = VrrpPacket::advertisement(VRID, 100, 100, vec![]);
                let source = std::net::IpAddr::V4(std::net::Ipv4Addr::from(n));
                producer.push(Advertisement {
                    packet,
                    pseudo_header: PseudoHeader::new(source, IpVersion::V4.multicast_address(), 8),
                });
            }
        }),
    )
    .await;

    assert!(pushed.is_ok());
    assert_eq!(queue.len(), 1000);
    assert_eq!(queue.dropped(), 4000);
    let oldest = queue.pop().await;
    assert_eq!(oldest.source(), std::net::IpAddr::V4(std::net::Ipv4Addr::from(4000u32)));
}
