//! Two players following each other through a line relay on loopback.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use framesync_core::playback::{FrameBuffer, SyntheticMedia};
use framesync_core::render::{InputEvent, Key, OverlayView, Renderer};
use framesync_core::{Player, SyncConfig, SyntheticDecoder};
use parking_lot::Mutex;

#[derive(Default)]
struct ScriptedRenderer {
    queue: VecDeque<InputEvent>,
}

impl Renderer for ScriptedRenderer {
    fn present(&mut self, _frame: Option<&FrameBuffer>, _overlay: &OverlayView) {}

    fn poll_input(&mut self) -> Vec<InputEvent> {
        self.queue.drain(..).collect()
    }
}

type Peer = Player<SyntheticDecoder, ScriptedRenderer>;

/// Forwards every line to all other clients, prefixed with the sender's name
fn spawn_relay() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let clients: Arc<Mutex<Vec<(usize, TcpStream)>>> = Arc::default();

    thread::spawn(move || {
        for (index, stream) in listener.incoming().enumerate() {
            let Ok(stream) = stream else { break };
            let id = index + 1;
            clients.lock().push((id, stream.try_clone().unwrap()));

            let clients = Arc::clone(&clients);
            thread::spawn(move || {
                for line in BufReader::new(stream).lines() {
                    let Ok(line) = line else { break };
                    for (other, out) in clients.lock().iter_mut() {
                        if *other != id {
                            let _ = writeln!(out, "Client{}: {}", id, line);
                        }
                    }
                }
            });
        }
    });

    port
}

fn peer(port: u16) -> Peer {
    let media = SyntheticMedia {
        label: "movie".to_string(),
        duration_secs: 600.0,
        ..SyntheticMedia::default()
    };
    let mut player = Player::new(
        SyntheticDecoder::new(media),
        ScriptedRenderer::default(),
        SyncConfig::default(),
    )
    .unwrap();
    player.connect("127.0.0.1", port).unwrap();
    player
}

fn press(player: &mut Peer, key: Key) {
    player.renderer_mut().queue.push_back(InputEvent::Key(key));
}

fn tick_until(a: &mut Peer, b: &mut Peer, done: impl Fn(&Peer, &Peer) -> bool) -> bool {
    for _ in 0..600 {
        a.tick();
        b.tick();
        if done(a, b) {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn position(player: &Peer) -> f64 {
    player.engine().state().position_secs()
}

fn paused(player: &Peer) -> bool {
    player.engine().state().is_paused()
}

#[test]
fn test_peer_follows_pause_and_seek() {
    let port = spawn_relay();
    let mut a = peer(port);
    let mut b = peer(port);

    // let the opening broadcasts cross before anyone acts
    for _ in 0..5 {
        a.tick();
        b.tick();
        thread::sleep(Duration::from_millis(10));
    }

    press(&mut a, Key::Space);
    assert!(tick_until(&mut a, &mut b, |_, b| paused(b)), "B never followed the pause");

    press(&mut a, Key::Right);
    let followed = tick_until(&mut a, &mut b, |a, b| (position(a) - position(b)).abs() < 0.05 && position(b) > 9.0);
    assert!(followed, "B never followed the seek (a={:.3}, b={:.3})", position(&a), position(&b));
    assert!(paused(&a) && paused(&b));

    press(&mut a, Key::Space);
    assert!(tick_until(&mut a, &mut b, |_, b| !paused(b)), "B never resumed");

    let a_stats = a.shutdown();
    // give A's closing line time to arrive; it must not move B
    let before = position(&b);
    for _ in 0..10 {
        b.tick();
        thread::sleep(Duration::from_millis(10));
    }
    assert!(position(&b) >= before);
    let b_stats = b.shutdown();

    assert_eq!(a_stats.local_actions, 3);
    assert!(b_stats.seeks_forced >= 1);
    assert!(b_stats.pause_flips >= 2);
    assert_eq!(b_stats.local_actions, 0);
    assert_eq!(a_stats.seeks_forced, 0);
}

#[test]
fn test_player_survives_relay_loss() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut player = peer(port);
    let (stream, _) = listener.accept().unwrap();

    player.tick();
    drop(stream);
    drop(listener);

    for _ in 0..50 {
        player.tick();
        thread::sleep(Duration::from_millis(5));
    }
    assert!(player.engine().state().decoded_frame_count() >= 51);
    player.shutdown();
}
