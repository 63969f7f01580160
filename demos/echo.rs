//! A minimal handler wired against [`InMemoryTransport`], echoing the
//! request path back as the response body. Demonstrates wiring a
//! [`Handler`] into a [`Runner`] without a real ZeroMQ transport.

use mongrel2_handler::response::Body;
use mongrel2_handler::{Connection, Handler, HttpRequest, HttpResponse, Registry, Runner};
use mongrel2_handler::transport::InMemoryTransport;

struct EchoHandler;

impl Handler for EchoHandler {
    fn handle(&mut self, req: &HttpRequest) -> Option<HttpResponse> {
        let mut resp = HttpResponse::new(req.envelope.sender_id.clone(), req.envelope.conn_id);
        resp.set_status(200);
        resp.body = Body::Bytes(bytes::Bytes::copy_from_slice(req.envelope.path.as_bytes()));
        Some(resp)
    }
}

fn main() {
    env_logger::init();

    let (handler_recv, driver_send) = InMemoryTransport::pair();
    let (driver_recv, handler_send) = InMemoryTransport::pair();

    let conn = Connection::open(
        "demo-app",
        "tcp://127.0.0.1:9999",
        "tcp://127.0.0.1:9998",
        Box::new(handler_recv),
        Box::new(handler_send),
        Registry::new(),
    );

    let mut runner = Runner::new(conn, EchoHandler);

    std::thread::spawn(move || {
        use mongrel2_handler::Transport;
        let mut driver_send = driver_send;
        let mut driver_recv = driver_recv;
        driver_send
            .send(bytes::Bytes::from_static(b"demo 1 /hello 26:6:METHOD,3:GET,4:PATH,1:/,}0:,"))
            .expect("send demo frame");
        let reply = driver_recv.recv().expect("recv reply");
        println!("reply: {:?}", reply);
    });

    #[cfg(unix)]
    {
        let _ = runner.run();
    }
}
