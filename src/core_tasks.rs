/// This is the main file for the processes being run.
/// There are two functions holding these processes
/// for every virtual router:
///     - Network Process (pub(crate) fn network_process)
///     - Event Process (pub(crate) async fn event_process)
///
/// The network process sits on a blocking thread since it waits on
/// the IP layer. The event process is the only owner of the
/// virtual router once started.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{sleep_until, Instant},
};

use crate::{
    defaults::{EVENT_CHANNEL_SIZE, PACKET_QUEUE_SIZE},
    error::{NetError, NetResult},
    hooks::{Hook, Transition},
    network::{IpLayer, Link},
    observer::EventObserver,
    queue::PacketQueue,
    router::VirtualRouter,
    state_machine::{Event, States},
};

/// Messages the host sends to a running virtual router.
pub(crate) enum Control {
    Event(Event),
    Enroll(Transition, Hook),
}

/// Host side of a running virtual router.
pub struct RouterHandle {
    name: String,
    control: mpsc::Sender<Control>,
    stop_flag: Arc<AtomicBool>,
    state: watch::Receiver<States>,
    event_task: JoinHandle<VirtualRouter>,
    network_task: JoinHandle<()>,
    ip: Arc<dyn IpLayer>,
}

impl RouterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last state published by the decision loop.
    pub fn state(&self) -> States {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<States> {
        self.state.clone()
    }

    /// Registers `hook` on the running instance. Last write wins.
    pub async fn enroll(&self, transition: Transition, hook: Hook) -> NetResult<()> {
        self.control
            .send(Control::Enroll(transition, hook))
            .await
            .map_err(|_| NetError::Stopped)
    }

    /// Shuts the instance down: a Master resigns with a priority 0
    /// advertisement. Waits for both workers, closes the IP layer and gives
    /// back the now inert router.
    ///
    /// The receiver is stopped and the IP layer closed even when the decision
    /// loop died, in which case its failure is returned.
    pub async fn stop(self) -> NetResult<VirtualRouter> {
        if self
            .control
            .send(Control::Event(Event::Shutdown))
            .await
            .is_err()
        {
            log::debug!("({}) decision loop already gone", self.name);
        }

        self.stop_flag.store(true, Ordering::SeqCst);
        let vrouter = self
            .event_task
            .await
            .map_err(|err| NetError::Other(format!("decision loop failed: {err}")));

        if let Err(err) = self.network_task.await {
            log::error!("({}) packet receiver failed: {err}", self.name);
        }
        self.ip.close();

        match &vrouter {
            Ok(_) => log::info!("({}) stopped", self.name),
            Err(err) => log::error!("({}) stopped after failure: {err}", self.name),
        }
        vrouter
    }
}

/// Spawns both processes of `vrouter` and injects the startup event.
/// Must be called from within a tokio runtime.
pub(crate) fn start(vrouter: VirtualRouter, link: Link) -> RouterHandle {
    let name = vrouter.name.clone();
    let (control_tx, control_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    let (state_tx, state_rx) = watch::channel(vrouter.fsm.state);
    let queue = Arc::new(PacketQueue::new(PACKET_QUEUE_SIZE));
    let stop_flag = Arc::new(AtomicBool::new(false));

    let network_task = {
        let name = name.clone();
        let vrid = vrouter.vrid;
        let ip = link.ip.clone();
        let queue = queue.clone();
        let stop_flag = stop_flag.clone();
        tokio::task::spawn_blocking(move || network_process(&name, vrid, ip, &queue, &stop_flag))
    };

    // the channel is empty, only a closed receiver could refuse this
    if control_tx
        .try_send(Control::Event(Event::Startup))
        .is_err()
    {
        log::error!("({name}) unable to queue startup event");
    }

    let ip = link.ip.clone();
    let event_task = tokio::spawn(event_process(
        vrouter,
        link,
        control_rx,
        queue,
        state_tx,
        stop_flag.clone(),
    ));

    log::info!("({name}) started");
    RouterHandle {
        name,
        control: control_tx,
        stop_flag,
        state: state_rx,
        event_task,
        network_task,
        ip,
    }
}

/// Starts `vrouter` and keeps it running until Ctrl-C.
pub async fn run(vrouter: VirtualRouter, link: Link) -> NetResult<VirtualRouter> {
    let handle = start(vrouter, link);
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("({}) unable to listen for shutdown signal: {err}", handle.name());
    }
    handle.stop().await
}

/// Receives advertisements until the stop flag is raised and queues the
/// ones meant for `vrid`. Every receive is bounded by the IP layer's
/// timeout, so the flag is seen within that time.
pub(crate) fn network_process(
    name: &str,
    vrid: u8,
    ip: Arc<dyn IpLayer>,
    queue: &PacketQueue,
    stop_flag: &AtomicBool,
) {
    while !stop_flag.load(Ordering::SeqCst) {
        match ip.receive() {
            Ok(advert) if advert.packet.vrid != vrid => {
                log::trace!(
                    "({name}) ignoring advertisement for vrid {} from {}",
                    advert.packet.vrid,
                    advert.source()
                );
            }
            Ok(advert) => {
                queue.push(advert);
            }
            Err(NetError::Timeout) => {}
            Err(err) => log::debug!("({name}) dropping incoming packet: {err}"),
        }
    }
    log::debug!("({name}) packet receiver stopped");
}

/// Single decision loop of a virtual router. Control messages come first,
/// then the armed timer, then queued advertisements.
///
/// Runs until a shutdown is processed or every handle is gone, then raises
/// the stop flag and hands the router back.
pub(crate) async fn event_process(
    mut vrouter: VirtualRouter,
    link: Link,
    mut control: mpsc::Receiver<Control>,
    queue: Arc<PacketQueue>,
    state_tx: watch::Sender<States>,
    stop_flag: Arc<AtomicBool>,
) -> VirtualRouter {
    let mut orphaned = false;
    loop {
        let timer = vrouter.fsm.timer;
        let deadline = timer.waiting_for;

        tokio::select! {
            biased;

            msg = control.recv() => match msg {
                Some(Control::Event(event)) => {
                    let shutdown = event == Event::Shutdown;
                    EventObserver::notify(&mut vrouter, &link, event);
                    if shutdown {
                        break;
                    }
                }
                Some(Control::Enroll(transition, hook)) => {
                    vrouter.enroll(transition, hook);
                }
                None => {
                    log::info!("({}) all handles dropped, shutting down", vrouter.name);
                    EventObserver::notify(&mut vrouter, &link, Event::Shutdown);
                    orphaned = true;
                    break;
                }
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if timer.is_armed() => {
                if let Some(event) = Event::from_timer(timer.t_type) {
                    EventObserver::notify(&mut vrouter, &link, event);
                }
                // an expired timer nobody re-armed must not fire again
                if vrouter.fsm.timer.waiting_for == deadline {
                    vrouter.fsm.disable_timer();
                }
            }

            advert = queue.pop() => {
                EventObserver::notify(&mut vrouter, &link, Event::Advert(advert));
            }
        }

        state_tx.send_replace(vrouter.fsm.state);
    }

    state_tx.send_replace(vrouter.fsm.state);
    stop_flag.store(true, Ordering::SeqCst);
    // nobody is left to call stop()
    if orphaned {
        link.ip.close();
    }
    vrouter
}
