use crate::domain::media::StreamInfo;
use ffmpeg_next as ffmpeg;
use tokio::task;

/// Reads the native frame rate and resolution of a stream or file.
pub(super) async fn probe(input: &str) -> Result<StreamInfo, String> {
    let input = input.to_string();
    task::spawn_blocking(move || probe_blocking(&input))
        .await
        .map_err(|e| e.to_string())?
}

fn probe_blocking(input: &str) -> Result<StreamInfo, String> {
    ffmpeg::init().map_err(|e| e.to_string())?;

    let mut options = ffmpeg::Dictionary::new();
    if input.starts_with("rtsp") {
        options.set("rtsp_transport", "tcp");
    }
    let context = ffmpeg::format::input_with_dictionary(&input, options).map_err(|e| e.to_string())?;
    let stream = context
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| String::from("no video stream"))?;

    let rate = match stream.avg_frame_rate() {
        r if r.numerator() > 0 && r.denominator() > 0 => r,
        _ => stream.rate(),
    };
    let fps = f64::from(rate);
    if !fps.is_finite() || fps <= 0.0 {
        return Err(format!("unusable frame rate {}", rate));
    }

    let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .and_then(|c| c.decoder().video())
        .map_err(|e| e.to_string())?;

    Ok(StreamInfo {
        fps,
        width: decoder.width(),
        height: decoder.height(),
    })
}
