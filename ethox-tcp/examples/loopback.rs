//! Two stacks talking over an in-process link.
//!
//! The client connects to the server, sends a single message and closes. The server prints what
//! it received and closes its side as well. Segments travel through a channel and a router thread
//! hands each to the stack owning its destination address.
use std::sync::{mpsc, Arc, Weak};
use std::thread;

use parking_lot::Mutex;
use structopt::StructOpt;

use ethox_tcp::layer::{FnHandler, ip::InterfaceId, tcp};
use ethox_tcp::wire::{IpAddress, IpProtocol};

const CLIENT: IpAddress = IpAddress::new(10, 0, 0, 1);
const SERVER: IpAddress = IpAddress::new(10, 0, 0, 2);

struct Frame {
    payload: Vec<u8>,
    src: IpAddress,
    dst: IpAddress,
}

fn stack(link: mpsc::Sender<Frame>) -> Arc<tcp::Stack> {
    let link = Mutex::new(link);
    let ip = FnHandler(move |_: IpProtocol, payload: &[u8], src: IpAddress, dst: IpAddress| {
        link.lock()
            .send(Frame { payload: payload.to_vec(), src, dst })
            .map_err(|_| ethox_tcp::layer::Error::Unreachable)
    });
    Arc::new(tcp::Stack::new(tcp::Config::default(), Arc::new(ip)))
}

fn main() {
    let Config { message, port } = Config::from_args();

    let (link, frames) = mpsc::channel();
    let client = stack(link.clone());
    let server = stack(link);

    let router = {
        let (client, server) = (Arc::downgrade(&client), Arc::downgrade(&server));
        thread::spawn(move || route(frames, client, server))
    };

    let client_timer = client.spawn_timer().expect("Couldn't start the client timer");
    let server_timer = server.spawn_timer().expect("Couldn't start the server timer");

    let listen = tcp::SocketAddr::new(SERVER, port);
    let local = tcp::SocketAddr::new(CLIENT, 40000);
    server.bind(listen).unwrap();
    client.bind(local).unwrap();

    let (reply, listening) = tcp::completion();
    server.open(listen, None, false, None, reply);
    listening.wait().expect("Couldn't listen");

    let (reply, connected) = tcp::completion();
    client.open(local, Some(listen), true, None, reply);
    connected.wait().expect("Couldn't connect");

    let (reply, received) = tcp::completion();
    server.receive(listen, 1 << 10, reply);
    let (reply, sent) = tcp::completion();
    client.send(local, message.as_bytes(), reply);
    sent.wait().expect("Couldn't send");

    let data = received.wait().expect("Couldn't receive");
    println!("{}: {}", listen, String::from_utf8_lossy(&data));

    let (reply, client_closed) = tcp::completion();
    client.close(local, reply);
    client_closed.wait().expect("Couldn't close the client");

    let (reply, server_closed) = tcp::completion();
    server.close(listen, reply);
    server_closed.wait().expect("Couldn't close the server");

    println!("client {}, server {}",
        client.status(local).unwrap(),
        server.status(listen).unwrap());

    client_timer.stop();
    server_timer.stop();
    // Dropping both stacks closes the link, which ends the router.
    drop((client, server));
    router.join().unwrap();
}

fn route(frames: mpsc::Receiver<Frame>, client: Weak<tcp::Stack>, server: Weak<tcp::Stack>) {
    for frame in frames {
        let target = if frame.dst == SERVER { &server } else { &client };
        let target = match target.upgrade() {
            Some(target) => target,
            None => continue,
        };
        if let Err(err) = target.ingress(&frame.payload, frame.src, frame.dst, InterfaceId(0)) {
            eprintln!("dropped segment: {}", err);
        }
    }
}

#[derive(StructOpt)]
struct Config {
    /// The message the client sends.
    #[structopt(default_value = "Hello, world!")]
    message: String,

    /// The port the server listens on.
    #[structopt(short, long, default_value = "7")]
    port: u16,
}
