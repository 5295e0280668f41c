/*
 * Device Drivers
 *
 * Drivers sit between the raw peripheral code under arch/ and the rest
 * of the kernel. The only driver this kernel carries is the serial
 * console, which doubles as the demonstration of how interrupt-driven
 * input composes with the scheduler's sleep/wakeup.
 */

pub mod serial;
