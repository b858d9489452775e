use crate::{
    defaults::OWNER_PRIORITY,
    network::Link,
    packet::Advertisement,
    router::VirtualRouter,
    state_machine::{Event, States},
    timers::centis_to_duration,
};

/// Applies every event of the decision loop to a virtual router.
/// Actions on each event are specified in RFC 5798 sections 6.4.1 to 6.4.3.
///
/// Collaborator failures are logged and never stop a transition.
#[derive(Debug, Clone)]
pub(crate) struct EventObserver;

impl EventObserver {
    pub(crate) fn notify(vrouter: &mut VirtualRouter, link: &Link, event: Event) {
        match (vrouter.fsm.state, event) {
            (States::Init, Event::Startup) => {
                if vrouter.priority() == OWNER_PRIORITY || vrouter.is_owner() {
                    send_advertisement(vrouter, link, vrouter.priority());
                    announce_addresses(vrouter, link);
                    vrouter
                        .fsm
                        .set_advert_timer(centis_to_duration(vrouter.advert_interval()));
                    vrouter.transition_to(States::Master);
                } else {
                    vrouter.set_master_adver_interval(vrouter.advert_interval());
                    vrouter
                        .fsm
                        .set_master_down_timer(centis_to_duration(vrouter.master_down_interval));
                    vrouter.transition_to(States::Backup);
                }
            }

            (States::Master, Event::Shutdown) => {
                vrouter.fsm.disable_timer();
                // resign: the configured priority itself is never touched
                send_advertisement(vrouter, link, 0);
                vrouter.transition_to(States::Init);
            }

            (States::Master, Event::AdverTimer) => {
                send_advertisement(vrouter, link, vrouter.priority());
                vrouter
                    .fsm
                    .set_advert_timer(centis_to_duration(vrouter.advert_interval()));
            }

            (States::Master, Event::Advert(advert)) => {
                let priority = advert.packet.priority;
                if priority == 0 {
                    log::debug!("({}) ignoring resignation from {}", vrouter.name, advert.source());
                } else if outranks(vrouter, &advert) {
                    vrouter.fsm.disable_timer();
                    vrouter.set_master_adver_interval(advert.packet.adver_int);
                    vrouter
                        .fsm
                        .set_master_down_timer(centis_to_duration(vrouter.master_down_interval));
                    log::info!(
                        "({}) {} advertised priority {priority}, stepping down",
                        vrouter.name,
                        advert.source()
                    );
                    vrouter.transition_to(States::Backup);
                } else {
                    log::debug!(
                        "({}) discarding advertisement from {} with priority {priority}",
                        vrouter.name,
                        advert.source()
                    );
                }
            }

            (States::Backup, Event::Shutdown) => {
                vrouter.fsm.disable_timer();
                vrouter.transition_to(States::Init);
            }

            (States::Backup, Event::Advert(advert)) => {
                let priority = advert.packet.priority;
                if priority == 0 {
                    // master is resigning, take over after Skew_Time only
                    vrouter
                        .fsm
                        .set_master_down_timer(centis_to_duration(vrouter.skew_time));
                } else if !vrouter.preempt_mode() || outranks(vrouter, &advert) {
                    vrouter.set_master_adver_interval(advert.packet.adver_int);
                    vrouter
                        .fsm
                        .set_master_down_timer(centis_to_duration(vrouter.master_down_interval));
                } else {
                    log::debug!(
                        "({}) discarding advertisement from {} with priority {priority}, master down in {:?}",
                        vrouter.name,
                        advert.source(),
                        vrouter.fsm.timer.remaining().unwrap_or_default()
                    );
                }
            }

            (States::Backup, Event::MasterDown) => {
                send_advertisement(vrouter, link, vrouter.priority());
                announce_addresses(vrouter, link);
                vrouter
                    .fsm
                    .set_advert_timer(centis_to_duration(vrouter.advert_interval()));
                vrouter.transition_to(States::Master);
            }

            (state, event) => {
                log::debug!("({}) {event:?} has no effect in {state}", vrouter.name);
            }
        }
    }
}

/// Higher priority wins; on equal priority the larger source address does.
fn outranks(vrouter: &VirtualRouter, advert: &Advertisement) -> bool {
    let priority = advert.packet.priority;
    priority > vrouter.priority()
        || (priority == vrouter.priority() && vrouter.loses_tie_to(&advert.source()))
}

fn send_advertisement(vrouter: &VirtualRouter, link: &Link, priority: u8) {
    let pkt = vrouter.advertisement(priority);
    if let Err(err) = link.ip.send(&pkt.encode()) {
        log::warn!("({}) unable to send advertisement: {err}", vrouter.name);
    }
}

fn announce_addresses(vrouter: &VirtualRouter, link: &Link) {
    if let Err(err) = link.announcer.announce_all(&vrouter.ip_addresses()) {
        log::warn!("({}) unable to announce addresses: {err}", vrouter.name);
    }
}
