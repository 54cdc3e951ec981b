use std::{borrow::BorrowMut, io::Cursor};

use tokio::io::{AsyncReadExt, AsyncSeekExt, BufStream};

use crate::packets::{PingPongPacket, StatusRequestC2SPacket, StatusResponseS2CPacket};
use crate::serialization::MinecraftStream;

fn make_minecraft_stream(array: Vec<u8>) -> MinecraftStream<BufStream<Cursor<Vec<u8>>>> {
    let stream = BufStream::new(Cursor::new(array));
    MinecraftStream::new(stream, 1024)
}

#[tokio::test]
async fn read_signature_tracks_body_len_separate_from_id() {
    // length=9 (1 byte id + 8 byte body), id=0x00 (one byte)
    let array: Vec<u8> = vec![0x09, 0x00, 1, 2, 3, 4, 5, 6, 7, 8];
    let mut minecraft = make_minecraft_stream(array);
    let signature = minecraft.read_signature().await.unwrap();
    assert_eq!(signature.length, 9);
    assert_eq!(signature.packet_id, 0);
    assert_eq!(signature.body_len, 8);
}

#[tokio::test]
async fn read_raw_packet_returns_opaque_body() {
    let array: Vec<u8> = vec![0x04, 0x01, 0xAA, 0xBB, 0xCC];
    let mut minecraft = make_minecraft_stream(array);
    let (signature, body) = minecraft.read_raw_packet().await.unwrap();
    assert_eq!(signature.packet_id, 1);
    assert_eq!(body, vec![0xAA, 0xBB, 0xCC]);
}

#[tokio::test]
async fn status_request_round_trips_with_empty_body() {
    let mut stream = BufStream::new(Cursor::new(vec![0; 64]));
    {
        let mut minecraft = MinecraftStream::new(stream.borrow_mut(), 64);
        minecraft
            .write_packet(&StatusRequestC2SPacket {})
            .await
            .unwrap();
    }
    stream.seek(std::io::SeekFrom::Start(0)).await.unwrap();
    let mut array = vec![0_u8; 64];
    _ = stream.read(&mut array).await.unwrap();
    stream.seek(std::io::SeekFrom::Start(0)).await.unwrap();
    let mut minecraft = MinecraftStream::new(stream.borrow_mut(), 64);
    let signature = minecraft.read_signature().await.unwrap();
    assert_eq!(signature.packet_id, 0);
    assert_eq!(signature.body_len, 0);
}

#[tokio::test]
async fn status_response_round_trip() {
    let mut stream = BufStream::new(Cursor::new(vec![0; 1024]));
    {
        let mut minecraft = MinecraftStream::new(stream.borrow_mut(), 1024);
        minecraft
            .write_packet(&StatusResponseS2CPacket {
                json: "{\"version\":{}}".to_owned(),
            })
            .await
            .unwrap();
    }
    stream.seek(std::io::SeekFrom::Start(0)).await.unwrap();
    let mut array = vec![0_u8; 1024];
    _ = stream.read(&mut array).await.unwrap();
    stream.seek(std::io::SeekFrom::Start(0)).await.unwrap();
    let mut minecraft = MinecraftStream::new(stream.borrow_mut(), 1024);
    let packet = minecraft
        .read_packet::<StatusResponseS2CPacket>()
        .await
        .unwrap();
    assert_eq!(packet.json, "{\"version\":{}}");
}

#[tokio::test]
async fn ping_pong_echoes_payload() {
    let mut stream = BufStream::new(Cursor::new(vec![0; 64]));
    {
        let mut minecraft = MinecraftStream::new(stream.borrow_mut(), 64);
        minecraft
            .write_packet(&PingPongPacket { payload: -7 })
            .await
            .unwrap();
    }
    stream.seek(std::io::SeekFrom::Start(0)).await.unwrap();
    let mut array = vec![0_u8; 64];
    _ = stream.read(&mut array).await.unwrap();
    stream.seek(std::io::SeekFrom::Start(0)).await.unwrap();
    let mut minecraft = MinecraftStream::new(stream.borrow_mut(), 64);
    let packet = minecraft.read_packet::<PingPongPacket>().await.unwrap();
    assert_eq!(packet.payload, -7);
}
