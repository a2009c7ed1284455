// Kaeppa Head Unit — ESP-IDF A2DP Sink / AVRCP Controller
//
// Bluedroid calls back on its own BTC task. The callbacks below only update
// the shared link snapshot and push `SinkEvent`s onto the main-loop queue;
// PCM frames go straight to the I2S driver.
//
// The controller and Bluedroid are brought up by `BtDriver`; A2DP, AVRCP
// and GAP are driven through the raw `esp-idf-sys` bindings.

use std::ffi::CString;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use esp_idf_hal::delay::BLOCK;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::i2s::config::{DataBitWidth, StdConfig};
use esp_idf_hal::i2s::{I2sDriver, I2sTx, I2S0};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::bt::{BtClassic, BtDriver};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys as sys;

use crate::drivers::reconnect::ReconnectPolicy;
use crate::drivers::{sbc_sample_rate, AudioSink, I2sPins};
use crate::error::{log_failure, Error};
use crate::events::{publish, PeerAddress, PlaybackState, SinkEvent};

/// Until the source's stream configuration says otherwise.
const DEFAULT_SAMPLE_RATE_HZ: u32 = 44_100;

const PEER_NAMESPACE: &str = "a2dp";
const LAST_PEER_KEY: &str = "last_peer";

// ---------------------------------------------------------------------------
// Shared link snapshot (written by the BTC task, read by the main loop)
// ---------------------------------------------------------------------------
struct Link {
    peer: PeerAddress,
    last_peer: PeerAddress,
    source_name: String,
    audio_state: PlaybackState,
    events: Option<SyncSender<SinkEvent>>,
    reconnect: ReconnectPolicy,
}

static LINK: Mutex<Link> = Mutex::new(Link {
    peer: PeerAddress([0; 6]),
    last_peer: PeerAddress([0; 6]),
    source_name: String::new(),
    audio_state: PlaybackState::RemoteSuspend,
    events: None,
    reconnect: ReconnectPolicy::new(),
});

static CONNECTED: AtomicBool = AtomicBool::new(false);
static METADATA_MASK: AtomicU8 = AtomicU8::new(0);
static TRANSACTION_LABEL: AtomicU8 = AtomicU8::new(0);

static I2S_OUT: Mutex<Option<I2sDriver<'static, I2sTx>>> = Mutex::new(None);
static I2S_PINS: Mutex<Option<I2sPins>> = Mutex::new(None);
static SAMPLE_RATE: AtomicU32 = AtomicU32::new(DEFAULT_SAMPLE_RATE_HZ);
static PEER_STORE: Mutex<Option<EspNvs<NvsDefault>>> = Mutex::new(None);

fn lock<T>(mutex: &'static Mutex<T>) -> MutexGuard<'static, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check(what: &str, code: sys::esp_err_t) -> Result<(), Error> {
    sys::EspError::convert(code).map_err(|e| Error::Bluetooth(format!("{}: {}", what, e)))
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------
pub struct EspA2dpSink {
    _bt: BtDriver<'static, BtClassic>,
    i2s: Option<I2S0>,
    pins: Option<I2sPins>,
}

impl EspA2dpSink {
    pub fn new(modem: Modem, i2s: I2S0, nvs: EspDefaultNvsPartition) -> Result<Self, Error> {
        let bt = BtDriver::<BtClassic>::new(modem, Some(nvs.clone()))
            .map_err(|e| Error::Bluetooth(format!("controller init: {}", e)))?;

        let peers = EspNvs::new(nvs, PEER_NAMESPACE, true)
            .map_err(|e| Error::Storage(format!("peer namespace: {}", e)))?;

        let mut raw = [0u8; 6];
        match peers.get_blob(LAST_PEER_KEY, &mut raw) {
            Ok(Some(bytes)) if bytes.len() == 6 => {
                lock(&LINK).last_peer = PeerAddress(raw);
            }
            Ok(_) => log::info!("No previous peer stored"),
            Err(e) => log::warn!("Last peer read: {}", e),
        }
        *lock(&PEER_STORE) = Some(peers);

        Ok(Self {
            _bt: bt,
            i2s: Some(i2s),
            pins: None,
        })
    }

    fn start_i2s(&mut self) -> Result<(), Error> {
        let pins = self
            .pins
            .ok_or_else(|| Error::Audio("I2S pins not configured".into()))?;
        let i2s = self
            .i2s
            .take()
            .ok_or_else(|| Error::Audio("I2S already started".into()))?;

        let rate = SAMPLE_RATE.load(Ordering::Relaxed);
        *lock(&I2S_OUT) = Some(open_i2s(i2s, pins, rate)?);
        *lock(&I2S_PINS) = Some(pins);
        Ok(())
    }
}

impl AudioSink for EspA2dpSink {
    fn set_pin_config(&mut self, pins: I2sPins) -> Result<(), Error> {
        self.pins = Some(pins);
        Ok(())
    }

    fn set_auto_reconnect(&mut self, window: Option<Duration>) -> Result<(), Error> {
        lock(&LINK).reconnect.set_window(window);
        Ok(())
    }

    fn set_event_sender(&mut self, events: SyncSender<SinkEvent>) -> Result<(), Error> {
        lock(&LINK).events = Some(events);
        Ok(())
    }

    fn set_metadata_mask(&mut self, mask: u8) -> Result<(), Error> {
        METADATA_MASK.store(mask, Ordering::Relaxed);
        Ok(())
    }

    fn start(&mut self, device_name: &str) -> Result<(), Error> {
        self.start_i2s()?;

        let name = CString::new(device_name)
            .map_err(|_| Error::Bluetooth("device name contains NUL".into()))?;

        // AVRCP must be up before the A2DP sink is initialised.
        unsafe {
            check("device name", sys::esp_bt_dev_set_device_name(name.as_ptr()))?;
            check("gap callback", sys::esp_bt_gap_register_callback(Some(gap_callback)))?;
            check("avrc init", sys::esp_avrc_ct_init())?;
            check("avrc callback", sys::esp_avrc_ct_register_callback(Some(avrc_callback)))?;
            check("a2dp callback", sys::esp_a2d_register_callback(Some(a2d_callback)))?;
            check(
                "a2dp data callback",
                sys::esp_a2d_sink_register_data_callback(Some(a2d_data_callback)),
            )?;
            check("a2dp init", sys::esp_a2d_sink_init())?;
        }
        set_discoverable(true);
        log::info!("A2DP sink started as {:?}", device_name);

        let (enabled, last) = {
            let link = lock(&LINK);
            (link.reconnect.is_enabled(), link.last_peer)
        };
        if enabled && last != PeerAddress::default() {
            log::info!("Reconnecting to {}", last);
            log_failure("Reconnect", connect(last));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        CONNECTED.load(Ordering::Acquire)
    }

    fn audio_state(&self) -> PlaybackState {
        lock(&LINK).audio_state
    }

    fn connected_source_name(&self) -> String {
        lock(&LINK).source_name.clone()
    }

    fn current_peer(&self) -> PeerAddress {
        lock(&LINK).peer
    }

    fn last_peer(&self) -> PeerAddress {
        lock(&LINK).last_peer
    }

    fn play(&mut self) -> Result<(), Error> {
        passthrough(sys::esp_avrc_pt_cmd_t_ESP_AVRC_PT_CMD_PLAY)
    }

    fn pause(&mut self) -> Result<(), Error> {
        passthrough(sys::esp_avrc_pt_cmd_t_ESP_AVRC_PT_CMD_PAUSE)
    }

    fn next(&mut self) -> Result<(), Error> {
        passthrough(sys::esp_avrc_pt_cmd_t_ESP_AVRC_PT_CMD_FORWARD)
    }

    fn previous(&mut self) -> Result<(), Error> {
        passthrough(sys::esp_avrc_pt_cmd_t_ESP_AVRC_PT_CMD_BACKWARD)
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        // Set before the request: the disconnect event may arrive on the BTC
        // task before the call returns.
        let mut bda = {
            let mut link = lock(&LINK);
            link.reconnect.disconnect_requested();
            link.peer.0
        };
        let result =
            unsafe { check("disconnect", sys::esp_a2d_sink_disconnect(bda.as_mut_ptr())) };
        if result.is_err() {
            lock(&LINK).reconnect.disconnect_failed();
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------
fn open_i2s(i2s: I2S0, pins: I2sPins, rate: u32) -> Result<I2sDriver<'static, I2sTx>, Error> {
    let config = StdConfig::philips(rate, DataBitWidth::Bits16);
    // SAFETY: the pin numbers come from config.rs and no other driver
    // claims them.
    let (bck, ws, dout) = unsafe {
        (
            AnyIOPin::new(pins.bck),
            AnyIOPin::new(pins.ws),
            AnyIOPin::new(pins.data_out),
        )
    };

    let mut driver = I2sDriver::new_std_tx(i2s, &config, bck, dout, Option::<AnyIOPin>::None, ws)
        .map_err(|e| Error::Audio(e.to_string()))?;
    driver.tx_enable().map_err(|e| Error::Audio(e.to_string()))?;

    log::info!(
        "I2S out: BCK={} WS={} DATA={} @ {} Hz",
        pins.bck,
        pins.ws,
        pins.data_out,
        rate
    );
    Ok(driver)
}

/// Rebuild the TX channel at `rate`. No-op when already running at it.
fn set_sample_rate(rate: u32) -> Result<(), Error> {
    let pins = (*lock(&I2S_PINS)).ok_or_else(|| Error::Audio("I2S not started".into()))?;

    let mut out = lock(&I2S_OUT);
    if out.is_some() && SAMPLE_RATE.load(Ordering::Relaxed) == rate {
        return Ok(());
    }
    // Dropping the driver disables and deletes the channel.
    drop(out.take());
    // SAFETY: the only driver that owned I2S0 was dropped above.
    let i2s = unsafe { I2S0::new() };
    *out = Some(open_i2s(i2s, pins, rate)?);
    SAMPLE_RATE.store(rate, Ordering::Relaxed);
    Ok(())
}

fn next_label() -> u8 {
    TRANSACTION_LABEL.fetch_add(1, Ordering::Relaxed) & 0x0F
}

/// Press and release one AVRCP pass-through key.
fn passthrough(key: sys::esp_avrc_pt_cmd_t) -> Result<(), Error> {
    let key = key as u8;
    unsafe {
        check(
            "passthrough press",
            sys::esp_avrc_ct_send_passthrough_cmd(
                next_label(),
                key,
                sys::esp_avrc_pt_cmd_state_t_ESP_AVRC_PT_CMD_STATE_PRESSED as u8,
            ),
        )?;
        check(
            "passthrough release",
            sys::esp_avrc_ct_send_passthrough_cmd(
                next_label(),
                key,
                sys::esp_avrc_pt_cmd_state_t_ESP_AVRC_PT_CMD_STATE_RELEASED as u8,
            ),
        )
    }
}

fn connect(peer: PeerAddress) -> Result<(), Error> {
    let mut bda = peer.0;
    unsafe { check("connect", sys::esp_a2d_sink_connect(bda.as_mut_ptr())) }
}

fn set_discoverable(on: bool) {
    let (conn, disc) = if on {
        (
            sys::esp_bt_connection_mode_t_ESP_BT_CONNECTABLE,
            sys::esp_bt_discovery_mode_t_ESP_BT_GENERAL_DISCOVERABLE,
        )
    } else {
        (
            sys::esp_bt_connection_mode_t_ESP_BT_NON_CONNECTABLE,
            sys::esp_bt_discovery_mode_t_ESP_BT_NON_DISCOVERABLE,
        )
    };
    log_failure("Scan mode", unsafe {
        check("scan mode", sys::esp_bt_gap_set_scan_mode(conn, disc))
    });
}

fn request_metadata() {
    let mask = METADATA_MASK.load(Ordering::Relaxed);
    if mask == 0 {
        return;
    }
    log_failure("Metadata request", unsafe {
        check("metadata", sys::esp_avrc_ct_send_metadata_cmd(next_label(), mask))
    });
    log_failure("Track notification", unsafe {
        check(
            "track notification",
            sys::esp_avrc_ct_send_register_notification_cmd(
                next_label(),
                sys::esp_avrc_rn_event_ids_t_ESP_AVRC_RN_TRACK_CHANGE as u8,
                0,
            ),
        )
    });
}

fn send_event(event: SinkEvent) {
    let events = lock(&LINK).events.clone();
    if let Some(events) = events {
        // A full queue is already logged by `publish`.
        let _ = publish(&events, event);
    }
}

fn remember_peer(peer: PeerAddress) {
    if let Some(store) = lock(&PEER_STORE).as_mut() {
        if let Err(e) = store.set_blob(LAST_PEER_KEY, &peer.0) {
            log::warn!("Last peer write: {}", e);
        }
    }
}

fn playback_from_raw(state: sys::esp_a2d_audio_state_t) -> PlaybackState {
    match state {
        sys::esp_a2d_audio_state_t_ESP_A2D_AUDIO_STATE_SUSPEND => PlaybackState::RemoteSuspend,
        sys::esp_a2d_audio_state_t_ESP_A2D_AUDIO_STATE_STARTED => PlaybackState::Started,
        _ => PlaybackState::Unknown,
    }
}

/// NUL-terminated device name buffer from GAP.
fn name_from_raw(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn set_source_name(name: String) {
    if !name.is_empty() {
        log::info!("Source name: {}", name);
        lock(&LINK).source_name = name;
    }
}

// ---------------------------------------------------------------------------
// Bluedroid callbacks (BTC task)
// ---------------------------------------------------------------------------
unsafe extern "C" fn a2d_callback(
    event: sys::esp_a2d_cb_event_t,
    param: *mut sys::esp_a2d_cb_param_t,
) {
    if param.is_null() {
        return;
    }
    let param = &*param;

    match event {
        sys::esp_a2d_cb_event_t_ESP_A2D_CONNECTION_STATE_EVT => {
            let conn = &param.conn_stat;
            let peer = PeerAddress(conn.remote_bda);
            match conn.state {
                sys::esp_a2d_connection_state_t_ESP_A2D_CONNECTION_STATE_CONNECTED => {
                    on_connected(peer)
                }
                sys::esp_a2d_connection_state_t_ESP_A2D_CONNECTION_STATE_DISCONNECTED => {
                    on_disconnected(peer)
                }
                _ => log::debug!("A2DP connection state {} ({})", conn.state, peer),
            }
        }
        sys::esp_a2d_cb_event_t_ESP_A2D_AUDIO_STATE_EVT => {
            let playback = playback_from_raw(param.audio_stat.state);
            lock(&LINK).audio_state = playback;
            send_event(SinkEvent::AudioStateChanged(playback));
        }
        sys::esp_a2d_cb_event_t_ESP_A2D_AUDIO_CFG_EVT => {
            let mcc = &param.audio_cfg.mcc;
            if u32::from(mcc.type_) != sys::ESP_A2D_MCT_SBC {
                log::warn!("A2DP codec type {} not supported", mcc.type_);
                return;
            }
            let cie0 = mcc.cie.sbc[0];
            match sbc_sample_rate(cie0) {
                Some(rate) => {
                    log::info!("A2DP stream configured: SBC @ {} Hz", rate);
                    log_failure("I2S sample rate", set_sample_rate(rate));
                }
                None => log::warn!("SBC config without sample rate: {:#04x}", cie0),
            }
        }
        _ => log::debug!("A2DP event {}", event),
    }
}

fn on_connected(peer: PeerAddress) {
    log::info!("A2DP connected to {}", peer);
    {
        let mut link = lock(&LINK);
        link.peer = peer;
        link.last_peer = peer;
        link.source_name.clear();
        link.reconnect.connected();
    }
    CONNECTED.store(true, Ordering::Release);

    remember_peer(peer);
    set_discoverable(false);

    let mut bda = peer.0;
    log_failure("Remote name", unsafe {
        check("remote name", sys::esp_bt_gap_read_remote_name(bda.as_mut_ptr()))
    });
}

fn on_disconnected(peer: PeerAddress) {
    log::info!("A2DP disconnected from {}", peer);
    CONNECTED.store(false, Ordering::Release);

    let retry = {
        let mut link = lock(&LINK);
        link.peer = PeerAddress::default();
        link.source_name.clear();

        link.reconnect.link_lost(Instant::now()).then_some(link.last_peer)
    };

    set_discoverable(true);

    if let Some(last) = retry.filter(|p| *p != PeerAddress::default()) {
        log::info!("Auto-reconnect to {}", last);
        log_failure("Auto-reconnect", connect(last));
    }
}

unsafe extern "C" fn a2d_data_callback(buf: *const u8, len: u32) {
    if buf.is_null() || len == 0 {
        return;
    }
    let pcm = std::slice::from_raw_parts(buf, len as usize);

    if let Some(i2s) = lock(&I2S_OUT).as_mut() {
        if let Err(e) = i2s.write_all(pcm, BLOCK) {
            log::warn!("I2S write: {}", e);
        }
    }
}

unsafe extern "C" fn avrc_callback(
    event: sys::esp_avrc_ct_cb_event_t,
    param: *mut sys::esp_avrc_ct_cb_param_t,
) {
    if param.is_null() {
        return;
    }
    let param = &*param;

    match event {
        sys::esp_avrc_ct_cb_event_t_ESP_AVRC_CT_CONNECTION_STATE_EVT => {
            let connected = param.conn_stat.connected;
            log::info!("AVRC connected: {}", connected);
            if connected {
                request_metadata();
            }
        }
        sys::esp_avrc_ct_cb_event_t_ESP_AVRC_CT_METADATA_RSP_EVT => {
            let rsp = &param.meta_rsp;
            let text = if rsp.attr_text.is_null() || rsp.attr_length <= 0 {
                String::new()
            } else {
                let raw = std::slice::from_raw_parts(rsp.attr_text, rsp.attr_length as usize);
                String::from_utf8_lossy(raw).into_owned()
            };
            send_event(SinkEvent::Metadata {
                attribute: rsp.attr_id,
                text,
            });
        }
        sys::esp_avrc_ct_cb_event_t_ESP_AVRC_CT_CHANGE_NOTIFY_EVT => {
            if param.change_ntf.event_id
                == sys::esp_avrc_rn_event_ids_t_ESP_AVRC_RN_TRACK_CHANGE as u8
            {
                request_metadata();
            }
        }
        _ => log::debug!("AVRC event {}", event),
    }
}

unsafe extern "C" fn gap_callback(
    event: sys::esp_bt_gap_cb_event_t,
    param: *mut sys::esp_bt_gap_cb_param_t,
) {
    if param.is_null() {
        return;
    }
    let param = &mut *param;

    match event {
        sys::esp_bt_gap_cb_event_t_ESP_BT_GAP_READ_REMOTE_NAME_EVT => {
            let rsp = &param.read_rmt_name;
            if rsp.stat == sys::esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                set_source_name(name_from_raw(&rsp.rmt_name));
            } else {
                log::warn!("Remote name lookup failed ({})", rsp.stat);
            }
        }
        sys::esp_bt_gap_cb_event_t_ESP_BT_GAP_AUTH_CMPL_EVT => {
            let auth = &param.auth_cmpl;
            if auth.stat == sys::esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                set_source_name(name_from_raw(&auth.device_name));
            } else {
                log::warn!("Authentication failed ({})", auth.stat);
            }
        }
        sys::esp_bt_gap_cb_event_t_ESP_BT_GAP_CFM_REQ_EVT => {
            // No display for a passkey: accept the numeric comparison.
            let bda = param.cfm_req.bda.as_mut_ptr();
            log_failure(
                "SSP confirm",
                check("ssp confirm", sys::esp_bt_gap_ssp_confirm_reply(bda, true)),
            );
        }
        _ => log::debug!("GAP event {}", event),
    }
}
