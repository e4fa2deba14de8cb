use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{ByteLink, Coordinator, Device, ErrorKind, ReceivePacket, Result, SendPacket};

/// A command from a `CoordinatorHandle` to the worker, carrying the oneshot to reply on.
enum Command {
    Process {
        packet: SendPacket,
        sender: oneshot::Sender<Result<ReceivePacket>>,
    },
    ReceiveAny {
        sender: oneshot::Sender<Result<Option<ReceivePacket>>>,
    },
    Identify {
        sender: oneshot::Sender<Result<Device>>,
    },
    ScanDevices {
        sender: oneshot::Sender<Result<Vec<Device>>>,
    },
    ConnectedDevices {
        sender: oneshot::Sender<Vec<Device>>,
    },
    SetNumberOfRetries {
        retries: usize,
        sender: oneshot::Sender<()>,
    },
}

/// Async front-end for a `Coordinator`.
///
/// The coordinator moves onto a dedicated blocking task, which runs one command at a time in
/// the order they were sent. Handles are cheap to clone. When the last one is dropped the worker
/// stops and its `JoinHandle` yields the coordinator back.
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Must be called from within a tokio runtime.
    pub fn spawn<L>(coordinator: Coordinator<L>) -> (Self, JoinHandle<Coordinator<L>>)
    where
        L: ByteLink + Send + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let worker = Worker {
            coordinator,
            commands: commands_rx,
        };
        let join = tokio::task::spawn_blocking(move || worker.run());

        (
            Self {
                commands: commands_tx,
            },
            join,
        )
    }

    async fn request<T, F>(&self, command: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command,
    {
        let (sender, receiver) = oneshot::channel();

        self.commands
            .send(command(sender))
            .await
            .map_err(|_| ErrorKind::ChannelError)?;

        let reply = receiver.await.map_err(|_| ErrorKind::ChannelError)?;
        Ok(reply)
    }

    pub async fn process(&self, packet: SendPacket) -> Result<ReceivePacket> {
        self.request(|sender| Command::Process { packet, sender })
            .await?
    }

    pub async fn receive_any(&self) -> Result<Option<ReceivePacket>> {
        self.request(|sender| Command::ReceiveAny { sender }).await?
    }

    pub async fn identify(&self) -> Result<Device> {
        self.request(|sender| Command::Identify { sender }).await?
    }

    /// Runs a scan and returns a snapshot of the devices found.
    pub async fn scan_devices(&self) -> Result<Vec<Device>> {
        self.request(|sender| Command::ScanDevices { sender })
            .await?
    }

    pub async fn connected_devices(&self) -> Result<Vec<Device>> {
        self.request(|sender| Command::ConnectedDevices { sender })
            .await
    }

    pub async fn set_number_of_retries(&self, retries: usize) -> Result<()> {
        self.request(|sender| Command::SetNumberOfRetries { retries, sender })
            .await
    }
}

struct Worker<L>
where
    L: ByteLink,
{
    coordinator: Coordinator<L>,
    commands: mpsc::Receiver<Command>,
}

impl<L> Worker<L>
where
    L: ByteLink,
{
    fn run(mut self) -> Coordinator<L> {
        while let Some(command) = self.commands.blocking_recv() {
            match command {
                Command::Process { mut packet, sender } => {
                    let result = self.coordinator.process(&mut packet);
                    forward(sender, log_link_failure(result));
                }
                Command::ReceiveAny { sender } => {
                    let result = self.coordinator.receive_any();
                    forward(sender, log_link_failure(result));
                }
                Command::Identify { sender } => {
                    let result = self.coordinator.identify().map(Device::clone);
                    forward(sender, log_link_failure(result));
                }
                Command::ScanDevices { sender } => {
                    let result = self
                        .coordinator
                        .scan_devices()
                        .map(|_| self.coordinator.connected_devices().to_vec());
                    forward(sender, log_link_failure(result));
                }
                Command::ConnectedDevices { sender } => {
                    forward(sender, self.coordinator.connected_devices().to_vec());
                }
                Command::SetNumberOfRetries { retries, sender } => {
                    self.coordinator.set_number_of_retries(retries);
                    forward(sender, ());
                }
            }
        }

        debug!("worker: all handles dropped");
        self.coordinator
    }
}

fn log_link_failure<T>(result: Result<T>) -> Result<T> {
    if let Err(error) = &result {
        if error.is_link_failure() {
            error!("worker: {}", error);
        }
    }
    result
}

fn forward<T>(sender: oneshot::Sender<T>, value: T) {
    if sender.send(value).is_err() {
        warn!("worker: requester went away before the reply");
    }
}
